use crate::config::ParserRules;
use thiserror::Error;

mod entities;

pub use entities::{Block, HeaderLine, MemberEntry, Token, parse_flag_tokens};

/// Structural errors: the listing does not follow the marker ordering
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error(
        "line {line_number}: set '{name}' starts while the header of set '{open}' is still open"
    )]
    NameInsideHeader {
        line_number: usize,
        name: String,
        open: String,
    },

    #[error("line {line_number}: members marker outside of a set header")]
    MembersOutsideHeader { line_number: usize },

    #[error("line {line_number}: line outside of any set listing: '{line}'")]
    LineOutsideBlock { line_number: usize, line: String },
}

/// Where the parser is within the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingName,
    InHeader,
    InMembers,
}

/// What a single line contributed to the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// A new set starts. Any set that was in its member region is complete.
    Opened(String),
    Header(HeaderLine),
    /// The header region of the current set closed
    MembersOpened,
    Member(MemberEntry),
}

/// Line-at-a-time state machine over a listing stream
pub struct BlockParser<'a> {
    rules: &'a ParserRules,
    state: ParserState,
    current: Option<String>,
    line_number: usize,
}

impl<'a> BlockParser<'a> {
    pub fn new(rules: &'a ParserRules) -> Self {
        Self {
            rules,
            state: ParserState::AwaitingName,
            current: None,
            line_number: 0,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Name of the set currently being read
    pub fn current_set(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Feed one line. Blank lines produce no event.
    pub fn push_line(&mut self, line: &str) -> Result<Option<ParseEvent>, StructureError> {
        self.line_number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        if let Some(name) = trimmed.strip_prefix(self.rules.name_marker.as_str()) {
            let name = name.trim().to_string();
            if self.state == ParserState::InHeader {
                return Err(StructureError::NameInsideHeader {
                    line_number: self.line_number,
                    name,
                    open: self.current.clone().unwrap_or_default(),
                });
            }
            self.state = ParserState::InHeader;
            self.current = Some(name.clone());
            return Ok(Some(ParseEvent::Opened(name)));
        }

        if trimmed == self.rules.members_marker {
            if self.state != ParserState::InHeader {
                return Err(StructureError::MembersOutsideHeader {
                    line_number: self.line_number,
                });
            }
            self.state = ParserState::InMembers;
            return Ok(Some(ParseEvent::MembersOpened));
        }

        match self.state {
            ParserState::InHeader => Ok(Some(ParseEvent::Header(HeaderLine::parse(trimmed)))),
            ParserState::InMembers => Ok(Some(ParseEvent::Member(MemberEntry::parse(
                trimmed,
                &self.rules.member_valueless_flags,
            )))),
            ParserState::AwaitingName => Err(StructureError::LineOutsideBlock {
                line_number: self.line_number,
                line: trimmed.to_string(),
            }),
        }
    }

    /// Drop the set being read and wait for the next name marker.
    /// Returns the abandoned set's name.
    pub fn abandon(&mut self) -> Option<String> {
        self.state = ParserState::AwaitingName;
        self.current.take()
    }

    /// Signal the end of the stream.
    ///
    /// Returns the name of a set whose header never closed; such a set is
    /// incomplete and must not be evaluated.
    pub fn finish(&mut self) -> Option<String> {
        let state = std::mem::replace(&mut self.state, ParserState::AwaitingName);
        let current = self.current.take();
        match state {
            ParserState::InHeader => current,
            _ => None,
        }
    }
}

/// Parse a complete listing text into blocks.
///
/// A trailing set whose header never closed is dropped.
pub fn parse_listing(input: &str, rules: &ParserRules) -> Result<Vec<Block>, StructureError> {
    let mut parser = BlockParser::new(rules);
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for line in input.lines() {
        match parser.push_line(line)? {
            Some(ParseEvent::Opened(name)) => {
                if let Some(done) = current.replace(Block::new(name)) {
                    blocks.push(done);
                }
            }
            Some(ParseEvent::Header(header)) => {
                if let Some(block) = current.as_mut() {
                    block.header_lines.push(header);
                }
            }
            Some(ParseEvent::Member(member)) => {
                if let Some(block) = current.as_mut() {
                    block.member_lines.push(member);
                }
            }
            Some(ParseEvent::MembersOpened) | None => {}
        }
    }

    if parser.finish().is_none() {
        blocks.extend(current);
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn rules() -> &'static ParserRules {
        &default_config().parser
    }

    #[test]
    fn test_state_transitions() {
        let mut parser = BlockParser::new(rules());
        assert_eq!(parser.state(), ParserState::AwaitingName);

        assert_eq!(
            parser.push_line("Name: myset").unwrap(),
            Some(ParseEvent::Opened("myset".into()))
        );
        assert_eq!(parser.state(), ParserState::InHeader);

        assert!(matches!(
            parser.push_line("Type: hash:ip").unwrap(),
            Some(ParseEvent::Header(_))
        ));
        assert_eq!(parser.push_line("").unwrap(), None);
        assert_eq!(
            parser.push_line("Members:").unwrap(),
            Some(ParseEvent::MembersOpened)
        );
        assert_eq!(parser.state(), ParserState::InMembers);

        assert!(matches!(
            parser.push_line("10.0.0.1").unwrap(),
            Some(ParseEvent::Member(_))
        ));
        assert_eq!(
            parser.push_line("Name: other").unwrap(),
            Some(ParseEvent::Opened("other".into()))
        );
        assert_eq!(parser.current_set(), Some("other"));
    }

    #[test]
    fn test_name_inside_header_is_structural() {
        let mut parser = BlockParser::new(rules());
        parser.push_line("Name: a").unwrap();
        let err = parser.push_line("Name: b").unwrap_err();
        assert_eq!(
            err,
            StructureError::NameInsideHeader {
                line_number: 2,
                name: "b".into(),
                open: "a".into()
            }
        );
    }

    #[test]
    fn test_members_before_name_is_structural() {
        let mut parser = BlockParser::new(rules());
        assert_eq!(
            parser.push_line("Members:").unwrap_err(),
            StructureError::MembersOutsideHeader { line_number: 1 }
        );
    }

    #[test]
    fn test_second_members_marker_is_structural() {
        let mut parser = BlockParser::new(rules());
        parser.push_line("Name: a").unwrap();
        parser.push_line("Members:").unwrap();
        assert!(matches!(
            parser.push_line("Members:"),
            Err(StructureError::MembersOutsideHeader { line_number: 3 })
        ));
    }

    #[test]
    fn test_line_before_any_name_is_structural() {
        let mut parser = BlockParser::new(rules());
        assert!(matches!(
            parser.push_line("Type: hash:ip"),
            Err(StructureError::LineOutsideBlock { .. })
        ));
    }

    #[test]
    fn test_finish_reports_open_header() {
        let mut parser = BlockParser::new(rules());
        parser.push_line("Name: cut").unwrap();
        parser.push_line("Type: hash:ip").unwrap();
        assert_eq!(parser.finish(), Some("cut".into()));

        let mut parser = BlockParser::new(rules());
        parser.push_line("Name: whole").unwrap();
        parser.push_line("Members:").unwrap();
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_abandon_resets_to_awaiting_name() {
        let mut parser = BlockParser::new(rules());
        parser.push_line("Name: a").unwrap();
        assert_eq!(parser.abandon(), Some("a".into()));
        assert_eq!(parser.state(), ParserState::AwaitingName);
        assert!(parser.push_line("Name: b").is_ok());
    }

    #[test]
    fn test_parse_listing_collects_blocks() {
        let text = "\
Name: a
Type: hash:ip
Members:
10.0.0.1
10.0.0.2 timeout 30

Name: b
Type: hash:net
Members:
";
        let blocks = parse_listing(text, rules()).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "a");
        assert_eq!(blocks[0].member_lines.len(), 2);
        assert_eq!(blocks[0].member_lines[1].options[0].name, "timeout");
        assert_eq!(blocks[1].header("Type"), Some("hash:net"));
        assert!(blocks[1].member_lines.is_empty());
    }
}
