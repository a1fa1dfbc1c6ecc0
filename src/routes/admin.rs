// Moderation surfaces. Every handler takes the AdminGate extractor, which
// is the one place the "am I admin" probe lives. Counts shown here are the
// server aggregates the gate already fetched.
//
// The queue mixes reports, appeals, warnings and suspensions; rendering and
// action dispatch go through ModerationItem so a new variant cannot be
// half-wired.

use askama::Template;
use axum::{
    extract::{Form, Path, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{
    AppState,
    auth_middleware::AdminGate,
    error::AppError,
    models::{KycSubmission, ModerationItem, ReportStats},
    timefmt,
};

// --- Display structs ---

pub struct ActionView {
    pub action: String,
    pub url: String,
}

pub struct ModerationRowView {
    pub kind: String,
    pub summary: String,
    pub when: String,
    pub actions: Vec<ActionView>,
}

pub struct KycQueueRowView {
    pub id: i64,
    pub user_id: i64,
    pub document_type: String,
    pub submitted: String,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    stats: ReportStats,
    queue: Vec<ModerationRowView>,
}

#[derive(Template)]
#[template(path = "admin_user.html")]
struct AdminUserTemplate {
    user_id: i64,
    history: Vec<ModerationRowView>,
}

#[derive(Template)]
#[template(path = "admin_kyc.html")]
struct AdminKycTemplate {
    queue: Vec<KycQueueRowView>,
}

fn render<T: Template>(template: T) -> Result<Html<String>, AppError> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render admin template: {}", e);
            Err(AppError::Internal(anyhow::Error::new(e)))
        }
    }
}

fn moderation_rows(items: &[ModerationItem]) -> Vec<ModerationRowView> {
    items
        .iter()
        .map(|item| {
            let actions = item
                .allowed_actions()
                .iter()
                .map(|action| {
                    let url = match item {
                        ModerationItem::Report(r) => format!("/admin/reports/{}", r.id),
                        ModerationItem::Warning(w) => format!("/admin/users/{}", w.user_id),
                        ModerationItem::Suspension(s) => {
                            format!("/admin/suspensions/{}/lift", s.id)
                        }
                        ModerationItem::Appeal(a) => format!("/admin/appeals/{}", a.id),
                    };
                    ActionView {
                        action: action.to_string(),
                        url,
                    }
                })
                .collect();
            ModerationRowView {
                kind: item.kind_label().to_string(),
                summary: item.summary(),
                when: timefmt::format_relative_time(item.created_at()).text,
                actions,
            }
        })
        .collect()
}

// --- Handlers ---

pub async fn dashboard(
    State(app_state): State<AppState>,
    gate: AdminGate,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Page: /admin");
    let (reports, appeals) = tokio::join!(
        app_state.api.admin_reports(&gate.token),
        app_state.api.admin_appeals(&gate.token),
    );
    let login = &app_state.settings.admin_login_endpoint;
    let reports = reports.map_err(|e| AppError::from_api(e, login))?;
    let appeals = appeals.map_err(|e| AppError::from_api(e, login))?;

    let mut queue: Vec<ModerationItem> = reports
        .into_iter()
        .map(ModerationItem::Report)
        .chain(appeals.into_iter().map(ModerationItem::Appeal))
        .collect();
    queue.sort_by_key(|item| std::cmp::Reverse(item.created_at()));

    render(AdminTemplate {
        stats: gate.stats.clone(),
        queue: moderation_rows(&queue),
    })
}

#[derive(Deserialize)]
pub struct ActionForm {
    action: String,
}

pub async fn act_on_report(
    State(app_state): State<AppState>,
    gate: AdminGate,
    Path(id): Path<i64>,
    Form(form): Form<ActionForm>,
) -> Result<Response, AppError> {
    tracing::info!("API call: act_on_report {} -> {}", id, form.action);
    let login = &app_state.settings.admin_login_endpoint;
    let reports = app_state
        .api
        .admin_reports(&gate.token)
        .await
        .map_err(|e| AppError::from_api(e, login))?;
    let report = reports
        .into_iter()
        .find(|r| r.id == id)
        .ok_or(AppError::NotFound)?;

    let item = ModerationItem::Report(report);
    if !item.allowed_actions().contains(&form.action.as_str()) {
        return Err(AppError::Validation(
            "This report was already handled.".to_string(),
        ));
    }

    app_state
        .api
        .admin_update_report(&gate.token, id, &form.action)
        .await
        .map_err(|e| AppError::from_api(e, login))?;
    Ok(Redirect::to("/admin").into_response())
}

pub async fn act_on_appeal(
    State(app_state): State<AppState>,
    gate: AdminGate,
    Path(id): Path<i64>,
    Form(form): Form<ActionForm>,
) -> Result<Response, AppError> {
    tracing::info!("API call: act_on_appeal {} -> {}", id, form.action);
    let login = &app_state.settings.admin_login_endpoint;
    let appeals = app_state
        .api
        .admin_appeals(&gate.token)
        .await
        .map_err(|e| AppError::from_api(e, login))?;
    let appeal = appeals
        .into_iter()
        .find(|a| a.id == id)
        .ok_or(AppError::NotFound)?;

    let item = ModerationItem::Appeal(appeal);
    if !item.allowed_actions().contains(&form.action.as_str()) {
        return Err(AppError::Validation(
            "This appeal was already decided.".to_string(),
        ));
    }

    app_state
        .api
        .admin_update_appeal(&gate.token, id, &form.action)
        .await
        .map_err(|e| AppError::from_api(e, login))?;
    Ok(Redirect::to("/admin").into_response())
}

pub async fn lift_suspension(
    State(app_state): State<AppState>,
    gate: AdminGate,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    tracing::info!("API call: lift_suspension {}", id);
    app_state
        .api
        .admin_lift_suspension(&gate.token, id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.admin_login_endpoint))?;
    Ok(Redirect::to("/admin").into_response())
}

#[derive(Deserialize)]
pub struct SuspendForm {
    reason: String,
}

pub async fn suspend_user(
    State(app_state): State<AppState>,
    gate: AdminGate,
    Path(user_id): Path<i64>,
    Form(form): Form<SuspendForm>,
) -> Result<Response, AppError> {
    tracing::info!("API call: suspend_user {}", user_id);
    let reason = form.reason.trim();
    if reason.len() < 5 {
        return Err(AppError::Validation(
            "Give a short reason for the suspension.".to_string(),
        ));
    }
    app_state
        .api
        .admin_suspend_user(&gate.token, user_id, reason)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.admin_login_endpoint))?;
    Ok(Redirect::to(&format!("/admin/users/{}", user_id)).into_response())
}

pub async fn user_history(
    State(app_state): State<AppState>,
    gate: AdminGate,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Page: /admin/users/{}", user_id);
    let history = app_state
        .api
        .admin_user_history(&gate.token, user_id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.admin_login_endpoint))?;
    render(AdminUserTemplate {
        user_id,
        history: moderation_rows(&history),
    })
}

pub async fn kyc_queue(
    State(app_state): State<AppState>,
    gate: AdminGate,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Page: /admin/kyc");
    let pending = app_state
        .api
        .kyc_pending(&gate.token)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.admin_login_endpoint))?;
    render(AdminKycTemplate {
        queue: kyc_queue_rows(&pending),
    })
}

fn kyc_queue_rows(items: &[KycSubmission]) -> Vec<KycQueueRowView> {
    items
        .iter()
        .map(|k| KycQueueRowView {
            id: k.id,
            user_id: k.user_id,
            document_type: k.document_type.clone(),
            submitted: timefmt::format_relative_time(k.submitted_at).text,
        })
        .collect()
}

#[derive(Deserialize)]
pub struct ReviewForm {
    decision: String,
    #[serde(default)]
    notes: String,
}

pub async fn review_kyc(
    State(app_state): State<AppState>,
    gate: AdminGate,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    tracing::info!("API call: review_kyc {} -> {}", id, form.decision);
    let approve = match form.decision.as_str() {
        "approve" => true,
        "reject" => false,
        _ => {
            return Err(AppError::Validation(
                "Decision must be approve or reject.".to_string(),
            ));
        }
    };
    let notes = form.notes.trim();
    let notes = (!notes.is_empty()).then_some(notes);
    app_state
        .api
        .kyc_review(&gate.token, id, approve, notes)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.admin_login_endpoint))?;
    Ok(Redirect::to("/admin/kyc").into_response())
}

/// Streams the current report list as CSV for offline review.
pub async fn export_reports_csv(
    State(app_state): State<AppState>,
    gate: AdminGate,
) -> Result<Response, AppError> {
    tracing::info!("API call: export_reports_csv");
    let reports = app_state
        .api
        .admin_reports(&gate.token)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.admin_login_endpoint))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "id",
            "reporterId",
            "targetType",
            "targetId",
            "reason",
            "status",
            "createdAt",
        ])
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    for r in &reports {
        writer
            .write_record([
                r.id.to_string(),
                r.reporter_id.to_string(),
                r.target_type.clone(),
                r.target_id.to_string(),
                r.reason.clone(),
                format!("{:?}", r.status).to_lowercase(),
                r.created_at.to_rfc3339(),
            ])
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("csv flush failed: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"reports.csv\"",
            ),
        ],
        bytes,
    )
        .into_response())
}
