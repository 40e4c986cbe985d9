//! Contact page route handlers.
//!
//! Messages are stored as rows in `contact_messages`; the dealer reads them
//! from the backend dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use azmotos_core::UserId;

use crate::config::DealerConfig;
use crate::filters;
use crate::middleware::RequireSession;
use crate::state::AppState;
use crate::supabase::tables;

/// Contact form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

/// Row inserted into `contact_messages`.
#[derive(Debug, Serialize)]
struct ContactMessage<'a> {
    name: &'a str,
    email: Option<&'a str>,
    phone: Option<&'a str>,
    message: &'a str,
    user_id: UserId,
}

impl ContactForm {
    fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.message.is_empty()
    }

    fn to_row(&self, user_id: UserId) -> ContactMessage<'_> {
        ContactMessage {
            name: &self.name,
            email: non_empty(&self.email),
            phone: non_empty(&self.phone),
            message: &self.message,
            user_id,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "contact/index.html")]
pub struct ContactTemplate {
    pub phones: Vec<String>,
    pub dealer_email: Option<String>,
    pub address: Option<String>,
    pub hours: Option<String>,
    pub whatsapp_url: Option<String>,
    pub form: ContactForm,
    pub error: Option<String>,
    pub sent: bool,
}

impl ContactTemplate {
    fn new(dealer: &DealerConfig, form: ContactForm) -> Self {
        Self {
            phones: dealer.phones.clone(),
            dealer_email: dealer.email.clone(),
            address: dealer.address.clone(),
            hours: dealer.hours.clone(),
            whatsapp_url: dealer
                .whatsapp
                .as_deref()
                .map(|number| format!("https://wa.me/{number}")),
            form,
            error: None,
            sent: false,
        }
    }
}

/// Display the contact page.
pub async fn page(State(state): State<AppState>, RequireSession(_): RequireSession) -> Response {
    ContactTemplate::new(&state.config().dealer, ContactForm::default()).into_response()
}

/// Handle contact form submission.
#[instrument(skip_all, fields(user_id = %current.user_id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireSession(current): RequireSession,
    Form(form): Form<ContactForm>,
) -> Response {
    let form = form.trimmed();
    let dealer = &state.config().dealer;

    if !form.is_complete() {
        let mut page = ContactTemplate::new(dealer, form);
        page.error = Some("Please enter your name and a message.".to_string());
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    let inserted = match serde_json::to_value(form.to_row(current.user_id)) {
        Ok(row) => {
            state
                .gateway()
                .insert_row(tables::CONTACT_MESSAGES, &row, Some(&current.access_token))
                .await
        }
        Err(e) => Err(e.into()),
    };

    match inserted {
        Ok(()) => {
            tracing::info!("Contact message stored");
            let mut page = ContactTemplate::new(dealer, ContactForm::default());
            page.sent = true;
            page.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to store contact message");
            let mut page = ContactTemplate::new(dealer, form);
            page.error = Some(
                "Your message could not be sent. Please try again or call us.".to_string(),
            );
            (StatusCode::BAD_GATEWAY, page).into_response()
        }
    }
}
