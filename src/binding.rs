//! Conversation-to-instance binding resolution
//!
//! A conversation can only be dispatched through an instance it is bound
//! to, addressed either by the stable contact id or by its normalized
//! display number.

use crate::db::Conversation;
use crate::dispatch::normalize_destination;
use crate::{Error, Result};

/// Resolved sending coordinates for one conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationBinding {
    /// Instance the message goes out through
    pub instance_id: String,
    /// Canonical destination address
    pub destination: String,
}

impl ConversationBinding {
    /// Resolve the binding for a conversation
    ///
    /// The contact id is preferred; the display number is a fallback that
    /// gets normalized first.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotConnected` when the conversation has no bound
    /// instance, and `MissingPhoneNumber` when neither address is usable
    pub fn resolve(conversation: &Conversation, country_code: &str) -> Result<Self> {
        let instance_id = conversation
            .instance_id
            .clone()
            .ok_or_else(|| Error::SessionNotConnected(conversation.id.clone()))?;

        let destination = match (&conversation.contact_id, &conversation.display_number) {
            (Some(contact), _) if !contact.is_empty() => contact.clone(),
            (_, Some(number)) if !number.is_empty() => {
                let normalized = normalize_destination(number, country_code);
                if normalized.is_empty() {
                    return Err(Error::MissingPhoneNumber(conversation.id.clone()));
                }
                normalized
            }
            _ => return Err(Error::MissingPhoneNumber(conversation.id.clone())),
        };

        Ok(Self {
            instance_id,
            destination,
        })
    }
}
