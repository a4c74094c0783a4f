//! Telegram Bot API wire structs (serde ready).
//! Only the fields the bot reads or writes are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Inbound webhook payload.
#[derive(Debug, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: User,
    pub chat: Chat,
}

#[derive(Debug, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// `sendMessage` body.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_web_page_preview: bool,
}

/// `setWebhook` body.
#[derive(Debug, Serialize)]
pub struct SetWebhook<'a> {
    pub url: &'a str,
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tolerates_missing_optional_parts() {
        let u: Update = serde_json::from_str(r#"{"update_id":1,"message":{"chat":{"id":55},"text":"/lc"}}"#).unwrap();
        let m = u.message.unwrap();
        assert_eq!(m.chat.id, 55);
        assert_eq!(m.text, "/lc");
        assert_eq!(m.from.username, "");

        let empty: Update = serde_json::from_str(r#"{"update_id":2,"edited_message":{}}"#).unwrap();
        assert!(empty.message.is_none());
    }

    #[test]
    fn plain_send_omits_parse_mode() {
        let body = SendMessage { chat_id: 1, text: "hi", parse_mode: None, disable_web_page_preview: false };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"chat_id":1,"text":"hi"}"#);
    }
}
