use serde::{Deserialize, Serialize};

use crate::replace::TargetId;

/// Value of a card: literal text kept verbatim, or a reference to a
/// replacement target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CardValue {
    Literal(String),
    Reference(TargetId),
}

impl CardValue {
    pub fn literal<S: Into<String>>(text: S) -> Self {
        CardValue::Literal(text.into())
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            CardValue::Literal(text) => Some(text),
            CardValue::Reference(_) => None,
        }
    }

    pub fn reference(&self) -> Option<TargetId> {
        match self {
            CardValue::Reference(id) => Some(*id),
            CardValue::Literal(_) => None,
        }
    }

    /// Storage encoding: references become the negative target ID.
    pub fn to_stored(&self) -> String {
        match self {
            CardValue::Literal(text) => text.clone(),
            CardValue::Reference(id) => format!("-{}", id.0),
        }
    }

    /// Decode a stored value. Negative integers are references only when the
    /// card can hold one; elsewhere they are plain numbers.
    pub fn from_stored(raw: &str, replaceable: bool) -> Self {
        if replaceable {
            if let Some(id) = negative_id(raw) {
                return CardValue::Reference(id);
            }
        }
        CardValue::Literal(raw.to_string())
    }
}

/// Parse `-N` (N > 0) into a target ID.
pub fn negative_id(text: &str) -> Option<TargetId> {
    let number: i64 = text.parse().ok()?;
    if number >= 0 {
        return None;
    }
    u32::try_from(-number).ok().map(TargetId)
}

/// A single key/value line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub name: String,
    #[serde(default)]
    pub value: Option<CardValue>,
    /// Whitespace between name and value as read; `None` for new cards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,
    /// Quote character that surrounded a replacement token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_quote: Option<char>,
}

impl Card {
    pub fn new<S: Into<String>>(name: S, value: Option<CardValue>) -> Self {
        Self {
            name: name.into(),
            value,
            spacing: None,
            token_quote: None,
        }
    }

    /// Card with no value, e.g. `QUIET`.
    pub fn flag<S: Into<String>>(name: S) -> Self {
        Self::new(name, None)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.value, Some(CardValue::Reference(_)))
    }

    pub fn stored_value(&self) -> Option<String> {
        self.value.as_ref().map(CardValue::to_stored)
    }
}

/// A line of a card file: a card, or a blank/comment line kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "line", rename_all = "snake_case")]
pub enum Line {
    Card(Card),
    Trivia { text: String },
}

impl Line {
    pub fn as_card(&self) -> Option<&Card> {
        match self {
            Line::Card(card) => Some(card),
            Line::Trivia { .. } => None,
        }
    }
}
