use crate::payload::Payload;

/// Arguments of a topic handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TopicEvent {
    /// The concrete topic that triggered the handler
    pub topic: String,
    /// The newly decoded value
    pub value: Payload,
    /// The value cached for this topic before this message, if any
    pub old_value: Option<Payload>,
}

impl TopicEvent {
    pub fn new(topic: impl Into<String>, value: Payload, old_value: Option<Payload>) -> Self {
        Self {
            topic: topic.into(),
            value,
            old_value,
        }
    }
}
