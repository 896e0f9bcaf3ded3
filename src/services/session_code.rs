use rand::Rng;

use crate::{dao::quiz_store::QuizStore, dao::storage::StorageResult};

/// Length of a shareable session code.
pub const CODE_LENGTH: usize = 6;
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Draw a random uppercase base-36 code.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Return the first generated code not already used by a stored session.
///
/// The check is not atomic with the insert that follows; callers must handle a
/// duplicate-key failure on insert.
pub async fn allocate(store: &dyn QuizStore) -> StorageResult<String> {
    loop {
        let code = generate_code(&mut rand::rng());
        if store.find_session_by_code(code.clone()).await?.is_none() {
            return Ok(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::dao::{
        models::{NewGameSession, SessionMode, SessionStatus},
        quiz_store::memory::MemoryQuizStore,
    };

    #[test]
    fn codes_are_six_uppercase_base36_chars() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            );
        }
    }

    #[tokio::test]
    async fn allocated_code_is_unused() {
        let store = MemoryQuizStore::new();
        for _ in 0..5 {
            let code = allocate(&store).await.unwrap();
            assert!(store.find_session_by_code(code.clone()).await.unwrap().is_none());
            store
                .insert_session(NewGameSession {
                    host: "h".into(),
                    code,
                    mode: SessionMode::Solo,
                    status: SessionStatus::Lobby,
                    quiz_settings: None,
                    participants: vec![],
                })
                .await
                .unwrap();
        }
    }
}
