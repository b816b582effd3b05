//! Normalized records and the pure mappings from raw provider payloads
//!
//! Only metadata is kept: addresses, identities and timestamps. Message bodies,
//! subjects and attachments are never read.

use serde::{Deserialize, Serialize};

/// Kind of normalized record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Gmail message headers
    Message,
    /// Outlook message recipients
    MailMessage,
    /// Teams channel message
    ChannelMessage,
    /// Zoom meeting
    Meeting,
    /// Zoom meeting participant
    Participant,
}

/// Normalized unit of acquired metadata, as written to the package
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// Gmail message headers
    Message(GmailMessage),
    /// Outlook message recipients
    MailMessage(OutlookMessage),
    /// Teams channel message
    ChannelMessage(ChannelMessage),
    /// Zoom meeting
    Meeting(Meeting),
    /// Zoom meeting participant
    Participant(Participant),
}

impl Record {
    /// The kind of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Message(_) => RecordKind::Message,
            Record::MailMessage(_) => RecordKind::MailMessage,
            Record::ChannelMessage(_) => RecordKind::ChannelMessage,
            Record::Meeting(_) => RecordKind::Meeting,
            Record::Participant(_) => RecordKind::Participant,
        }
    }
}

/// A parsed mailbox address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Display name, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    pub address: String,
}

/// Parse an address-list header value (`From`, `To`, `Cc`, `Bcc`)
///
/// Groups are flattened into their members. Unparsable values are kept verbatim
/// as a single address so no header is silently dropped.
pub fn parse_address_list(value: &str) -> Vec<Address> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }

    match mailparse::addrparse(value) {
        Ok(list) => {
            let mut addresses = Vec::new();
            for addr in list.iter() {
                match addr {
                    mailparse::MailAddr::Single(info) => addresses.push(Address {
                        name: info.display_name.clone(),
                        address: info.addr.clone(),
                    }),
                    mailparse::MailAddr::Group(group) => {
                        for member in &group.addrs {
                            addresses.push(Address {
                                name: member.display_name.clone(),
                                address: member.addr.clone(),
                            });
                        }
                    }
                }
            }
            addresses
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unparsable address header, keeping raw value");
            vec![Address {
                name: None,
                address: value.to_string(),
            }]
        }
    }
}

// --- Gmail ---

/// Gmail message headers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    /// Message ID
    pub id: String,
    /// Thread ID
    pub thread_id: Option<String>,
    /// Raw `Date` header
    pub date: Option<String>,
    /// `From` addresses
    pub from: Vec<Address>,
    /// `To` addresses
    pub to: Vec<Address>,
    /// `Cc` addresses
    pub cc: Vec<Address>,
    /// `Bcc` addresses
    pub bcc: Vec<Address>,
}

/// Raw Gmail `format=metadata` message payload
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGmailMessage {
    /// Message ID
    #[serde(default)]
    pub id: String,
    /// Thread ID
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Message part carrying the headers
    #[serde(default)]
    pub payload: RawGmailPayload,
}

/// Raw Gmail message part
#[derive(Debug, Default, Deserialize)]
pub struct RawGmailPayload {
    /// Header list
    #[serde(default)]
    pub headers: Vec<RawHeader>,
}

/// Raw name/value header
#[derive(Debug, Default, Deserialize)]
pub struct RawHeader {
    /// Header name
    #[serde(default)]
    pub name: String,
    /// Header value
    #[serde(default)]
    pub value: String,
}

impl From<RawGmailMessage> for GmailMessage {
    fn from(raw: RawGmailMessage) -> Self {
        // Last occurrence of each header wins
        let header = |name: &str| {
            raw.payload
                .headers
                .iter()
                .rev()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        };
        let addresses = |name: &str| header(name).map(parse_address_list).unwrap_or_default();

        Self {
            from: addresses("From"),
            to: addresses("To"),
            cc: addresses("Cc"),
            bcc: addresses("Bcc"),
            date: header("Date").map(str::to_string),
            id: raw.id.clone(),
            thread_id: raw.thread_id.clone(),
        }
    }
}

// --- Microsoft Graph ---

/// Graph `emailAddress` object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Outlook message recipients
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookMessage {
    /// Sender
    pub from: Option<EmailAddress>,
    /// To recipients
    pub to_recipients: Vec<EmailAddress>,
    /// Cc recipients
    pub cc_recipients: Vec<EmailAddress>,
    /// Bcc recipients
    pub bcc_recipients: Vec<EmailAddress>,
    /// Creation timestamp
    pub created_date_time: Option<String>,
}

/// Graph `recipient` wrapper
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecipient {
    /// Wrapped address
    #[serde(default)]
    pub email_address: EmailAddress,
}

/// Raw Graph message (selected fields)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOutlookMessage {
    /// Sender
    #[serde(default)]
    pub from: Option<RawRecipient>,
    /// To recipients
    #[serde(default)]
    pub to_recipients: Vec<RawRecipient>,
    /// Cc recipients
    #[serde(default)]
    pub cc_recipients: Vec<RawRecipient>,
    /// Bcc recipients
    #[serde(default)]
    pub bcc_recipients: Vec<RawRecipient>,
    /// Creation timestamp
    #[serde(default)]
    pub created_date_time: Option<String>,
}

impl From<RawOutlookMessage> for OutlookMessage {
    fn from(raw: RawOutlookMessage) -> Self {
        let unwrap = |list: Vec<RawRecipient>| list.into_iter().map(|r| r.email_address).collect();
        Self {
            from: raw.from.map(|r| r.email_address),
            to_recipients: unwrap(raw.to_recipients),
            cc_recipients: unwrap(raw.cc_recipients),
            bcc_recipients: unwrap(raw.bcc_recipients),
            created_date_time: raw.created_date_time,
        }
    }
}

/// Teams channel message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    /// Message ID
    pub id: String,
    /// Sender user ID (None for application/system messages)
    pub user_id: Option<String>,
    /// Sender display name
    pub display_name: Option<String>,
    /// Creation timestamp
    pub created_date_time: Option<String>,
    /// Users mentioned in the message
    pub mentions: Vec<Mention>,
}

/// Mention inside a channel message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    /// Mention index within the message
    pub id: Option<i64>,
    /// Mentioned user ID
    pub user_id: Option<String>,
    /// Mentioned user display name
    pub display_name: Option<String>,
}

/// Graph identity (`user` facet of `from`/`mentioned`)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentity {
    /// User ID
    #[serde(default)]
    pub id: Option<String>,
    /// Display name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Graph identity set
#[derive(Debug, Default, Deserialize)]
pub struct RawIdentitySet {
    /// User identity, if the actor is a user
    #[serde(default)]
    pub user: Option<RawIdentity>,
}

/// Raw Graph mention
#[derive(Debug, Default, Deserialize)]
pub struct RawMention {
    /// Mention index
    #[serde(default)]
    pub id: Option<i64>,
    /// Mentioned identity
    #[serde(default)]
    pub mentioned: Option<RawIdentitySet>,
}

/// Raw Graph channel message
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChannelMessage {
    /// Message ID
    #[serde(default)]
    pub id: String,
    /// Sender
    #[serde(default)]
    pub from: Option<RawIdentitySet>,
    /// Creation timestamp
    #[serde(default)]
    pub created_date_time: Option<String>,
    /// Mentions
    #[serde(default)]
    pub mentions: Vec<RawMention>,
}

impl From<RawChannelMessage> for ChannelMessage {
    fn from(raw: RawChannelMessage) -> Self {
        let user = raw.from.and_then(|f| f.user).unwrap_or_default();
        Self {
            id: raw.id,
            user_id: user.id,
            display_name: user.display_name,
            created_date_time: raw.created_date_time,
            mentions: raw
                .mentions
                .into_iter()
                .map(|m| {
                    let user = m.mentioned.and_then(|s| s.user).unwrap_or_default();
                    Mention {
                        id: m.id,
                        user_id: user.id,
                        display_name: user.display_name,
                    }
                })
                .collect(),
        }
    }
}

// --- Zoom ---

/// Zoom meeting IDs are numeric in the API but opaque here
fn zoom_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Zoom meeting
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    /// Meeting ID
    #[serde(default, deserialize_with = "zoom_id")]
    pub id: String,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Scheduled duration in minutes
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Zoom meeting participant
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Meeting this participant attended
    #[serde(default)]
    pub meeting_id: String,
    /// Participant user ID
    #[serde(default)]
    pub id: Option<String>,
    /// Participant display name
    #[serde(default)]
    pub name: Option<String>,
    /// Participant email
    #[serde(default)]
    pub user_email: Option<String>,
}
