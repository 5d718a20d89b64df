//! Read model for the dashboard plus the mute operation.

use {
    serde::{Deserialize, Serialize},
    ustoz_common::{MediaRef, QuestionId, RequesterId, RequesterProfile},
    ustoz_sessions::Question,
};

use crate::{
    error::Result,
    events::RelayEvent,
    router::{OpenedQuestion, SessionRouter},
};

/// A question as shown to observers, decrypted at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub requester_id: RequesterId,
    pub requester_display_name: String,
    pub requester_handle: Option<String>,
    /// Question text, or the media caption (empty when there is none).
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    pub created_at: u64,
    pub answered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterView {
    pub requester_id: RequesterId,
    pub display_name: String,
    pub handle: Option<String>,
    pub last_active_at: u64,
}

impl From<&OpenedQuestion> for QuestionView {
    fn from(opened: &OpenedQuestion) -> Self {
        let Question {
            id,
            requester_id,
            requester_display_name,
            requester_handle,
            created_at,
            answered,
            ..
        } = &opened.question;
        Self {
            question_id: *id,
            requester_id: *requester_id,
            requester_display_name: requester_display_name.clone(),
            requester_handle: requester_handle.clone(),
            text: opened.content.visible_text().unwrap_or_default().to_string(),
            media: opened.content.media().cloned(),
            created_at: *created_at,
            answered: *answered,
        }
    }
}

impl From<RequesterProfile> for RequesterView {
    fn from(p: RequesterProfile) -> Self {
        Self {
            requester_id: p.id,
            display_name: p.display_name,
            handle: p.handle,
            last_active_at: p.last_active_at,
        }
    }
}

impl SessionRouter {
    /// Live questions, newest first, excluding muted requesters.
    ///
    /// Questions past their retention are hidden even before the sweeper
    /// removes them, matching what `claim` accepts.
    pub async fn list_active_questions(&self) -> Result<Vec<QuestionView>> {
        let cutoff = self.cutoff(self.settings.question_ttl);
        let mut questions = self.store.list_questions().await?;
        questions.retain(|q| q.created_at >= cutoff);
        questions.sort_by(|a, b| b.id.cmp(&a.id));
        let mut views = Vec::with_capacity(questions.len());
        for question in questions {
            if self.store.is_muted(question.requester_id).await? {
                continue;
            }
            views.push(QuestionView::from(&self.open(question)));
        }
        Ok(views)
    }

    /// Known requesters, most recently active first, excluding muted ones.
    pub async fn list_active_requesters(&self) -> Result<Vec<RequesterView>> {
        let mut profiles = self.store.list_profiles().await?;
        profiles.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        let mut views = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if self.store.is_muted(profile.id).await? {
                continue;
            }
            views.push(RequesterView::from(profile));
        }
        Ok(views)
    }

    /// Silence a requester for good. Returns true only on the first call.
    ///
    /// Any half-finished question prompt is dropped with it.
    pub async fn mute_requester(&self, id: RequesterId) -> Result<bool> {
        let newly = self.store.mute(id).await?;
        self.store.take_session(id).await?;
        if newly {
            tracing::info!(requester_id = %id, "requester muted");
            self.emit(RelayEvent::RequesterMuted { requester_id: id });
        }
        Ok(newly)
    }

    pub async fn is_muted(&self, id: RequesterId) -> Result<bool> {
        Ok(self.store.is_muted(id).await?)
    }
}
