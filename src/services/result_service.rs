use tracing::info;
use validator::Validate;

use crate::{
    dao::{
        models::{NewQuizResult, QuizResultEntity, ResultFilter, Visibility},
        quiz_store::QuizStore,
    },
    dto::result::{
        CreateResultRequest, LeaderboardEntry, ResultListQuery, ResultResponse,
        UpdateResultRequest,
    },
    error::ServiceError,
    services::auth_service::AuthUser,
    state::SharedState,
};

/// Leaderboard size when the caller gives no usable limit.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

const NOT_FOUND: &str = "Quiz result not found.";

/// `correct / total` rounded to four decimal places.
pub fn derive_accuracy(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(correct) / f64::from(total) * 10_000.0).round() / 10_000.0
}

/// Parse a leaderboard limit the lenient way: leading integer, otherwise the default.
pub fn parse_limit(raw: Option<&str>) -> usize {
    let Some(raw) = raw.map(str::trim) else {
        return DEFAULT_LEADERBOARD_LIMIT;
    };
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<usize>() {
        Ok(value) if !negative && value > 0 => value,
        _ => DEFAULT_LEADERBOARD_LIMIT,
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|notes| notes.trim().to_owned())
        .filter(|notes| !notes.is_empty())
}

/// Check the payload and build an ownerless result.
fn validate_create(request: CreateResultRequest) -> Result<NewQuizResult, ServiceError> {
    let number_of_questions = request
        .number_of_questions
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            ServiceError::InvalidInput("numberOfQuestions must be a positive number.".into())
        })?;
    let correct_count = request
        .correct_count
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            ServiceError::InvalidInput("correctCount must be a non-negative number.".into())
        })?;
    if correct_count > number_of_questions {
        return Err(ServiceError::InvalidInput(
            "correctCount cannot exceed numberOfQuestions.".into(),
        ));
    }
    let total_time_seconds = match request.total_time_seconds {
        None => 0,
        Some(value) => u32::try_from(value).map_err(|_| {
            ServiceError::InvalidInput("totalTimeSeconds must be a non-negative number.".into())
        })?,
    };
    request.validate()?;

    let accuracy = request
        .accuracy
        .unwrap_or_else(|| derive_accuracy(correct_count, number_of_questions));

    Ok(NewQuizResult {
        user: None,
        topics: request.topics,
        difficulty: request.difficulty,
        number_of_questions,
        correct_count,
        total_time_seconds,
        accuracy,
        answers: request.answers.into_iter().map(Into::into).collect(),
        visibility: request.visibility.unwrap_or_default(),
        status: request.status.unwrap_or_default(),
        notes: normalize_notes(request.notes),
    })
}

/// Store a quiz attempt owned by `caller`.
pub async fn create_result(
    state: &SharedState,
    caller: &AuthUser,
    request: CreateResultRequest,
) -> Result<ResultResponse, ServiceError> {
    let mut result = validate_create(request)?;
    result.user = Some(caller.id.clone());

    let store = state.require_quiz_store().await?;
    let created = store
        .insert_result(result)
        .await
        .map_err(ServiceError::storage("Failed to save quiz result."))?;
    info!(id = %created.id, user = %caller.id, accuracy = created.accuracy, "quiz result saved");
    Ok(created.into())
}

/// Public completed results when asked for `visibility=public`, otherwise the caller's own.
pub async fn list_results(
    state: &SharedState,
    caller: &AuthUser,
    query: ResultListQuery,
) -> Result<Vec<ResultResponse>, ServiceError> {
    let filter = match query.visibility.as_deref() {
        Some("public") => ResultFilter::PublicCompleted,
        _ => ResultFilter::OwnedBy(caller.id.clone()),
    };

    let store = state.require_quiz_store().await?;
    let results = store
        .list_results(filter)
        .await
        .map_err(ServiceError::storage("Failed to fetch quiz results."))?;
    Ok(results.into_iter().map(Into::into).collect())
}

/// Fetch a result visible to `caller`: public ones or the caller's own.
pub async fn get_result(
    state: &SharedState,
    caller: &AuthUser,
    id: String,
) -> Result<ResultResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let result = load_result(store.as_ref(), id, "Failed to fetch quiz result.").await?;

    if result.visibility != Visibility::Public && !result.is_owned_by(&caller.id) {
        return Err(ServiceError::Forbidden(
            "Not authorized to view this result.".into(),
        ));
    }
    Ok(result.into())
}

/// Change visibility and/or notes; owner only.
pub async fn update_result(
    state: &SharedState,
    caller: &AuthUser,
    id: String,
    request: UpdateResultRequest,
) -> Result<ResultResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let mut result = load_result(store.as_ref(), id, "Failed to update quiz result.").await?;

    if !result.is_owned_by(&caller.id) {
        return Err(ServiceError::Forbidden(
            "Not authorized to update this result.".into(),
        ));
    }

    let visibility = match request.visibility {
        None => None,
        Some(value) => Some(
            value
                .as_deref()
                .and_then(Visibility::parse)
                .ok_or_else(|| ServiceError::InvalidInput("Invalid visibility value.".into()))?,
        ),
    };

    if visibility.is_none() && request.notes.is_none() {
        return Err(ServiceError::InvalidInput(
            "No valid fields provided for update.".into(),
        ));
    }

    if let Some(visibility) = visibility {
        result.visibility = visibility;
    }
    if let Some(notes) = request.notes {
        result.notes = normalize_notes(notes);
    }

    store
        .replace_result(result)
        .await
        .map_err(ServiceError::storage("Failed to update quiz result."))?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))
}

/// Delete a result; owner only.
pub async fn delete_result(
    state: &SharedState,
    caller: &AuthUser,
    id: String,
) -> Result<(), ServiceError> {
    let store = state.require_quiz_store().await?;
    let result = load_result(store.as_ref(), id, "Failed to delete quiz result.").await?;

    if !result.is_owned_by(&caller.id) {
        return Err(ServiceError::Forbidden(
            "Not authorized to delete this result.".into(),
        ));
    }

    let deleted = store
        .delete_result(result.id.clone())
        .await
        .map_err(ServiceError::storage("Failed to delete quiz result."))?;
    if !deleted {
        return Err(ServiceError::NotFound(NOT_FOUND.into()));
    }
    info!(id = %result.id, "quiz result deleted");
    Ok(())
}

/// Top public completed results with each owner reduced to an email.
pub async fn leaderboard(
    state: &SharedState,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let store = state.require_quiz_store().await?;
    let results = store
        .leaderboard(limit)
        .await
        .map_err(ServiceError::storage("Failed to fetch leaderboard."))?;

    let mut owners: Vec<String> = results.iter().filter_map(|r| r.user.clone()).collect();
    owners.sort();
    owners.dedup();
    let emails = if owners.is_empty() {
        Default::default()
    } else {
        store
            .user_emails(owners)
            .await
            .map_err(ServiceError::storage("Failed to fetch leaderboard."))?
    };

    Ok(results
        .into_iter()
        .map(|result| {
            let email = result.user.as_ref().and_then(|id| emails.get(id).cloned());
            LeaderboardEntry::new(result, email)
        })
        .collect())
}

async fn load_result(
    store: &dyn QuizStore,
    id: String,
    context: &'static str,
) -> Result<QuizResultEntity, ServiceError> {
    store
        .find_result(id)
        .await
        .map_err(ServiceError::storage(context))?
        .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))
}
