//! Server-rendered operator pages: sign-in, dashboard and the leads table.
//!
//! Markup is deliberately plain; every value that came from a submitter is
//! escaped before it reaches the page.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

use crate::board::LeadBoard;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{Lead, LeadListParams, LeadStatus, StatusFilter};
use crate::session::{self, SIGN_IN_PATH};

/// Number of leads listed under "Recent Leads" on the dashboard.
const RECENT_LEADS: usize = 8;

/// GET /
pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    match session::current_user(&state, &headers).await {
        Ok(Some(_)) => Redirect::to("/dashboard"),
        Ok(None) => Redirect::to(SIGN_IN_PATH),
        Err(e) => {
            tracing::error!("Session check failed on index: {}", e);
            Redirect::to(SIGN_IN_PATH)
        }
    }
}

/// GET /login
pub async fn login_form(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Ok(Some(_)) = session::current_user(&state, &headers).await {
        return Redirect::to("/dashboard").into_response();
    }
    Html(render_login(None)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// POST /login
pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    match state
        .auth
        .sign_in_with_password(form.email.trim(), &form.password)
        .await
    {
        Ok(session) => {
            tracing::info!("Operator {} signed in", session.user.id);
            let cookie = session::session_cookie(
                &session.access_token,
                session.expires_in,
                state.config.cookie_secure,
            );
            ([(header::SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response()
        }
        Err(AppError::Unauthorized(message)) => {
            (StatusCode::UNAUTHORIZED, Html(render_login(Some(&message)))).into_response()
        }
        Err(e) => {
            tracing::error!("Sign-in failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Html(render_login(Some("Sign-in is unavailable, try again shortly."))),
            )
                .into_response()
        }
    }
}

/// POST /logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session::session_token(&headers) {
        session::forget_session(&state, token).await;
        if let Err(e) = state.auth.sign_out(token).await {
            tracing::warn!("Auth provider sign-out failed: {}", e);
        }
    }

    let cookie = session::cleared_session_cookie(state.config.cookie_secure);
    ([(header::SET_COOKIE, cookie)], Redirect::to(SIGN_IN_PATH)).into_response()
}

/// GET /dashboard
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Html<String> {
    let (board, notice) = load_board(&state).await;
    Html(render_dashboard(&board, Utc::now(), notice.as_deref()))
}

/// GET /leads?status=
pub async fn leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeadListParams>,
) -> Result<Html<String>, AppError> {
    let filter = params
        .filter()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (mut board, notice) = load_board(&state).await;
    board.set_filter(filter);
    Ok(Html(render_leads(&board, notice.as_deref())))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub filter: Option<String>,
}

/// POST /leads/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(form): Form<StatusForm>,
) -> Result<Html<String>, AppError> {
    let status: LeadStatus = form
        .status
        .parse()
        .map_err(|e: crate::models::ParseStatusError| AppError::BadRequest(e.to_string()))?;

    let (mut board, notice) = load_board(&state).await;
    board.set_filter(parse_filter(form.filter.as_deref()));
    if notice.is_some() {
        return Ok(Html(render_leads(&board, notice.as_deref())));
    }

    let notice = match board.update_status(state.store.as_ref(), id, status).await {
        Ok(()) => None,
        Err(e) => Some(format!("Could not update the lead's status: {}", e)),
    };
    Ok(Html(render_leads(&board, notice.as_deref())))
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    /// Checkbox; present only when ticked.
    #[serde(default)]
    pub confirm: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

/// POST /leads/:id/delete
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(form): Form<DeleteForm>,
) -> Html<String> {
    let confirmed = form.confirm.is_some_and(|v| !v.is_empty());

    let (mut board, notice) = load_board(&state).await;
    board.set_filter(parse_filter(form.filter.as_deref()));
    if notice.is_some() {
        return Html(render_leads(&board, notice.as_deref()));
    }

    let notice = match board.delete(state.store.as_ref(), id, confirmed).await {
        Ok(()) => None,
        Err(AppError::BadRequest(_)) => {
            Some("Tick \"delete permanently\" to confirm the deletion.".to_string())
        }
        Err(e) => Some(format!("Could not delete the lead: {}", e)),
    };
    Html(render_leads(&board, notice.as_deref()))
}

/// Loads the board, degrading to an empty board plus a notice on failure.
async fn load_board(state: &AppState) -> (LeadBoard, Option<String>) {
    match LeadBoard::load(state.store.as_ref()).await {
        Ok(board) => (board, None),
        Err(e) => {
            tracing::error!("Failed to load leads: {}", e);
            (
                LeadBoard::default(),
                Some("Leads could not be loaded. Refresh to try again.".to_string()),
            )
        }
    }
}

fn parse_filter(raw: Option<&str>) -> StatusFilter {
    raw.and_then(|s| s.parse().ok()).unwrap_or_default()
}

// ============ Rendering ============

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders a submitter's link as an anchor, but only for http(s) URLs.
pub fn render_link(link: &str) -> String {
    match url::Url::parse(link.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => format!(
            r#"<a href="{0}" target="_blank" rel="noopener noreferrer">{0}</a>"#,
            escape(url.as_str())
        ),
        _ if link.is_empty() => "—".to_string(),
        _ => escape(link),
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "—".to_string()
    } else {
        escape(value)
    }
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y %H:%M").to_string()
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} · Stride Leads</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
    )
}

fn nav() -> &'static str {
    r#"<nav>
    <strong>STRIDE</strong> Lead Dashboard ·
    <a href="/dashboard">Dashboard</a> ·
    <a href="/leads">Leads</a>
    <form method="post" action="/logout" style="display:inline"><button type="submit">Sign Out</button></form>
</nav>"#
}

fn notice_html(notice: Option<&str>) -> String {
    notice
        .map(|n| format!(r#"<p role="alert">{}</p>"#, escape(n)))
        .unwrap_or_default()
}

pub fn render_login(error: Option<&str>) -> String {
    let body = format!(
        r#"<main>
    <h1>Dashboard</h1>
    <p>Sign in to manage your leads</p>
    <form method="post" action="/login">
        <label>Email <input type="email" name="email" required></label>
        <label>Password <input type="password" name="password" required></label>
        {error}
        <button type="submit">Sign In</button>
    </form>
</main>"#,
        error = notice_html(error),
    );
    page("Sign In", &body)
}

pub fn render_dashboard(board: &LeadBoard, now: DateTime<Utc>, notice: Option<&str>) -> String {
    let stats = board.stats(now);
    let mut body = String::new();

    let _ = write!(
        body,
        "{nav}\n<main>\n<h1>Dashboard</h1>\n{notice}\n<dl>\n<dt>Total Leads</dt><dd>{}</dd>\n<dt>This Week</dt><dd>{}</dd>\n",
        stats.total,
        stats.this_week,
        nav = nav(),
        notice = notice_html(notice),
    );
    for status in LeadStatus::ALL {
        let _ = writeln!(
            body,
            "<dt>{}</dt><dd>{}</dd>",
            status,
            stats.count(status)
        );
    }
    body.push_str("</dl>\n<h2>Recent Leads</h2>\n<a href=\"/leads\">View All →</a>\n");

    if board.leads().is_empty() {
        body.push_str(
            "<p>No leads yet. They'll appear here when someone submits the website form.</p>\n",
        );
    } else {
        body.push_str(
            "<table>\n<tr><th>Name</th><th>Company</th><th>Launching</th><th>Budget</th><th>Status</th><th>Date</th></tr>\n",
        );
        for lead in board.leads().iter().take(RECENT_LEADS) {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                or_dash(&lead.name),
                or_dash(&lead.company),
                or_dash(&lead.launching),
                or_dash(&lead.budget),
                lead.status,
                format_date(lead.created_at),
            );
        }
        body.push_str("</table>\n");
    }
    body.push_str("</main>");

    page("Dashboard", &body)
}

pub fn render_leads(board: &LeadBoard, notice: Option<&str>) -> String {
    let filter = board.filter();
    let mut body = String::new();

    let _ = write!(
        body,
        "{nav}\n<main>\n<h1>Leads</h1>\n<p>{} total · {} new</p>\n{notice}\n<p>",
        board.leads().len(),
        board.count(LeadStatus::New),
        nav = nav(),
        notice = notice_html(notice),
    );

    let _ = write!(
        body,
        r#"<a href="/leads?status=all"{}>all ({})</a>"#,
        current(filter == StatusFilter::All),
        board.leads().len()
    );
    for status in LeadStatus::ALL {
        let _ = write!(
            body,
            r#" <a href="/leads?status={0}"{1}>{0} ({2})</a>"#,
            status,
            current(filter == StatusFilter::Only(status)),
            board.count(status)
        );
    }
    body.push_str("</p>\n");

    let mut rows = 0;
    for lead in board.filtered() {
        rows += 1;
        render_lead_row(&mut body, lead, filter);
    }

    if rows == 0 {
        let empty = match filter {
            StatusFilter::All => "No leads yet.".to_string(),
            StatusFilter::Only(status) => format!("No leads with status \"{}\".", status),
        };
        let _ = writeln!(body, "<p>{}</p>", escape(&empty));
    }
    body.push_str("</main>");

    page("Leads", &body)
}

fn current(active: bool) -> &'static str {
    if active {
        r#" aria-current="page""#
    } else {
        ""
    }
}

fn render_lead_row(body: &mut String, lead: &Lead, filter: StatusFilter) {
    let submitted = if lead.submitted.is_empty() {
        format_date(lead.created_at)
    } else {
        escape(&lead.submitted)
    };

    let _ = write!(
        body,
        r#"<details>
<summary>{name} · {company} · {launching} · {budget} · {timeline} · <span class="badge badge-{status}">{status}</span> · {date}</summary>
<p>Website / Socials: {link}</p>
<p>Submitted: {submitted}</p>
<form method="post" action="/leads/{id}/status">
<input type="hidden" name="filter" value="{filter}">
"#,
        name = or_dash(&lead.name),
        company = or_dash(&lead.company),
        launching = or_dash(&lead.launching),
        budget = or_dash(&lead.budget),
        timeline = or_dash(&lead.timeline),
        status = lead.status,
        date = format_date(lead.created_at),
        link = render_link(&lead.link),
        submitted = submitted,
        id = lead.id,
        filter = filter.as_str(),
    );
    for status in LeadStatus::ALL {
        let disabled = if status == lead.status { " disabled" } else { "" };
        let _ = write!(
            body,
            r#"<button type="submit" name="status" value="{0}"{1}>{0}</button> "#,
            status, disabled
        );
    }
    let _ = write!(
        body,
        r#"
</form>
<form method="post" action="/leads/{id}/delete">
<input type="hidden" name="filter" value="{filter}">
<label><input type="checkbox" name="confirm" value="yes"> delete permanently</label>
<button type="submit">Delete Lead</button>
</form>
</details>
"#,
        id = lead.id,
        filter = filter.as_str(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(name: &str, link: &str) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: name.to_string(),
            company: String::new(),
            launching: String::new(),
            budget: String::new(),
            timeline: String::new(),
            link: link.to_string(),
            submitted: String::new(),
            status: LeadStatus::New,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#x27;y&#x27;"
        );
    }

    #[test]
    fn test_only_http_links_are_anchors() {
        assert!(render_link("https://acme.test/launch").starts_with("<a href=\"https://acme.test/launch\""));
        assert!(!render_link("javascript:alert(1)").contains("<a"));
        assert_eq!(render_link("@acme on x"), "@acme on x");
        assert_eq!(render_link(""), "—");
    }

    #[test]
    fn test_leads_page_escapes_submitter_text() {
        let board = LeadBoard::from_leads(vec![lead("<b>Ana</b>", "")]);
        let html = render_leads(&board, None);

        assert!(html.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(!html.contains("<b>Ana</b>"));
    }

    #[test]
    fn test_leads_page_empty_filter_message() {
        let mut board = LeadBoard::from_leads(vec![lead("Ana", "")]);
        board.set_filter(StatusFilter::Only(LeadStatus::Won));
        let html = render_leads(&board, None);

        assert!(html.contains("No leads with status &quot;won&quot;."));
    }

    #[test]
    fn test_dashboard_shows_recent_leads_only() {
        let leads: Vec<Lead> = (0..10).map(|i| lead(&format!("lead-{i}"), "")).collect();
        let board = LeadBoard::from_leads(leads);
        let html = render_dashboard(&board, Utc::now(), None);

        assert!(html.contains("lead-7"));
        assert!(!html.contains("lead-8"));
        assert!(html.contains("<dt>Total Leads</dt><dd>10</dd>"));
    }
}
