//! User-facing text.
//!
//! Requesters (students) get Uzbek copy. Responders get English operational
//! copy.

use ustoz_common::QuestionId;

use crate::{error::DeliveryError, message::Sender};

// ── Buttons ──────────────────────────────────────────────────────────────────

pub const ASK_BUTTON: &str = "✍️ Savol berish";
pub const ASK_AGAIN_BUTTON: &str = "✍️ Yana savol berish";
pub const CANCEL_QUESTION_BUTTON: &str = "❌ Bekor qilish";
pub const REPLY_BUTTON: &str = "📝 Reply";
pub const CANCEL_REPLY_BUTTON: &str = "❌ Cancel";

// ── Requester copy ───────────────────────────────────────────────────────────

/// Human-readable wait, e.g. `30 soniya`, `1 daqiqa 5 soniya`.
pub fn format_wait(secs: u64) -> String {
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} soat"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} daqiqa"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds} soniya"));
    }
    parts.join(" ")
}

pub fn requester_welcome(name: &str) -> String {
    format!(
        "🌟 Assalomu alaykum, {name}!\n\n\
         📚 O'qituvchi-O'quvchi botiga xush kelibsiz!\n\n\
         🔹 Savol berish uchun tugmani bosing:"
    )
}

pub const ASK_PROMPT: &str = "✍️ Savolingizni yozing\n\n\
    📝 O'qituvchiga yo'naltirmoqchi bo'lgan savolingizni yozing \
    yoki rasm/video (izoh bilan) yuboring.";

pub const QUESTION_CANCELLED: &str =
    "❌ Savol bekor qilindi\n\nYana savol berish uchun tugmani bosing:";

pub const QUESTION_CANCELLED_TOAST: &str = "❌ Bekor qilindi";

pub const PRESS_ASK_FIRST: &str = "💬 Savol berish\n\nSavol berish uchun tugmani bosing:";

pub fn rate_limited(retry_after_secs: u64) -> String {
    format!(
        "⏳ Biroz kuting!\n\nKeyingi savolni {} dan keyin yuborishingiz mumkin.",
        format_wait(retry_after_secs)
    )
}

pub fn question_sent_header(delivered: usize, cooldown_secs: u64) -> String {
    format!(
        "✅ Savolingiz yuborildi!\n\n\
         📊 Qabul qilgan o'qituvchilar: {delivered}\n\
         ⏰ Keyingi savol: {} dan keyin.\n\n\
         📤 Savolingiz:",
        format_wait(cooldown_secs)
    )
}

pub const ORIGINAL_QUESTION_HEADER: &str = "❓ Sizning savolingiz:";

pub fn answer_header(original: Option<&str>) -> String {
    match original {
        Some(text) => format!(
            "📨 Javob keldi!\n\n{ORIGINAL_QUESTION_HEADER}\n{text}\n\n👨‍🏫 O'qituvchi javobi:"
        ),
        None => "📨 Javob keldi!\n\n👨‍🏫 O'qituvchi javobi:".to_string(),
    }
}

pub fn dashboard_reply(text: &str) -> String {
    format!("👨‍🏫 Ustoz :\n\n{text}")
}

pub const REQUESTER_TRY_AGAIN: &str =
    "❌ Xatolik yuz berdi. Iltimos, keyinroq qayta urinib ko'ring.";

// ── Responder copy ───────────────────────────────────────────────────────────

pub fn responder_welcome(chat_id: i64) -> String {
    format!("🎓 Welcome, teacher!\n\n📊 Control panel is active.\n\n🆔 Your chat ID: {chat_id}")
}

pub fn new_question_header(id: QuestionId, from: &str) -> String {
    format!("💬 New question #{id}\n\n👤 From: {from}\n💭 Message:")
}

pub fn reply_mode_header(id: QuestionId, from: &str) -> String {
    format!(
        "✍️ Reply mode (question #{id})\n\
         📝 Send your answer as the next message: text, or a photo/video with a caption.\n\n\
         👤 From: {from}\n💭 Question:"
    )
}

pub const REPLY_TOAST: &str = "✍️ Write your answer in the next message";
pub const REPLY_CANCELLED_TOAST: &str = "❌ Reply cancelled";
pub const NO_ACTIVE_REPLY_ALERT: &str = "❌ Reply mode is not active or has expired.";
pub const QUESTION_NOT_FOUND_ALERT: &str = "❌ Question not found or expired!";
pub const NOT_A_RESPONDER_ALERT: &str = "❌ Access denied!";
pub const RESPONDER_CANNOT_ASK_ALERT: &str = "❌ You are a teacher!";
pub const UNKNOWN_ACTION_ALERT: &str = "⚠️ This button is no longer supported.";

pub const RESPONDER_IDLE: &str = "🎓 Teacher panel\n\n\
    🔄 Waiting for questions...\n\n\
    To answer a question, press 'Reply' under it.";

pub fn reply_sent_header(to: &str) -> String {
    format!("✅ Reply sent!\n\n👤 To: {to}\n📤 Your reply:")
}

pub fn reply_failed(error: &DeliveryError) -> String {
    let reason = match error {
        DeliveryError::Blocked { .. } => "The student blocked the bot or stopped the chat.",
        DeliveryError::Rejected { .. } => {
            "The request was rejected. The chat ID or file may be invalid."
        },
        DeliveryError::Transport { .. } => "Technical error while sending the message.",
    };
    format!("❌ Delivery failed!\n\n{reason}\n\nTry reaching the student another way.")
}

pub const RESPONDER_TRY_AGAIN: &str = "❌ Something went wrong. Please try again later.";

// ── Diagnostics ──────────────────────────────────────────────────────────────

pub fn my_id(sender: &Sender) -> String {
    format!(
        "🆔 Your details:\n\n\
         👤 User ID: {}\n\
         💬 Chat ID: {}\n\
         👤 Username: {}\n\
         📝 Name: {}\n\n\
         📋 Use the chat ID when configuring responders.",
        sender.id,
        sender.chat_id,
        sender
            .handle
            .as_deref()
            .map_or_else(|| "none".to_string(), |h| format!("@{h}")),
        sender.display_name,
    )
}

pub fn status(sender: &Sender, by_user: bool, by_chat: bool, responders: &[i64]) -> String {
    let mark = |yes: bool| if yes { "✅" } else { "❌" };
    let list = responders
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "📊 User status:\n\n\
         👤 User ID: {}\n\
         💬 Chat ID: {}\n\
         🔑 Responder (by user ID): {}\n\
         🔑 Responder (by chat ID): {}\n\n\
         📋 Configured responders: {list}",
        sender.id,
        sender.chat_id,
        mark(by_user),
        mark(by_chat),
    )
}
