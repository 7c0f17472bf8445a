//! Message pattern templates.
//!
//! Route output is written as a template where `{{.Field}}`
//! actions are substituted with values extracted from the matched line,
//! e.g. `{{.Name}} **OOC**: {{.Message}}`. Templates are parsed once when
//! a route is compiled; rendering only walks the parsed segments.

use crate::common::error::{RenderError, TemplateError};

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// A parsed message pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Fails on an unclosed `{{` or on any action other than `.Field`.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or(TemplateError::Unclosed {
                offset: offset + start,
            })?;

            let action = after_open[..end].trim();
            let field = action
                .strip_prefix('.')
                .filter(|f| is_identifier(f))
                .ok_or_else(|| TemplateError::Unsupported {
                    action: action.to_string(),
                })?;
            segments.push(Segment::Field(field.to_string()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Execute the template against a context.
    pub fn render(&self, ctx: &TemplateContext) -> Result<String, RenderError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = ctx.lookup(field).ok_or_else(|| RenderError::UnknownField {
                        field: field.clone(),
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Values available to a template.
///
/// Fields are referenced by their capitalised names: `Name`, `Message`,
/// `ChannelID`, `GuildID`, `Source` and `PlayerCount`.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub name: String,
    pub message: String,
    pub channel_id: String,
    pub guild_id: String,
    pub source: String,
    /// Only set for presence/status templates.
    pub player_count: Option<usize>,
}

impl TemplateContext {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = guild_id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Context for the bot presence line.
    pub fn player_count(count: usize) -> Self {
        Self {
            player_count: Some(count),
            ..Default::default()
        }
    }

    fn lookup(&self, field: &str) -> Option<String> {
        match field {
            "Name" => Some(self.name.clone()),
            "Message" => Some(self.message.clone()),
            "ChannelID" => Some(self.channel_id.clone()),
            "GuildID" => Some(self.guild_id.clone()),
            "Source" => Some(self.source.clone()),
            "PlayerCount" => self.player_count.map(|c| c.to_string()),
            _ => None,
        }
    }
}
