use ipset_filter::config::default_config;
use ipset_filter::parser::{BlockParser, ParseEvent, ParserState, StructureError, parse_listing};

const LISTING: &str = "\
Name: blacklist
Type: hash:ip
Revision: 4
Header: family inet hashsize 1024 maxelem 65536 counters comment
Size in memory: 1024
References: 1
Number of entries: 2
Members:
10.0.0.1 packets 0 bytes 0 comment \"first host\"
10.0.0.2 packets 150 bytes 2048 nomatch

Name: whitelist
Type: hash:net
Members:
";

#[test]
fn test_listing_with_two_sets() {
    let blocks = parse_listing(LISTING, &default_config().parser).unwrap();
    assert_eq!(blocks.len(), 2);

    let first = &blocks[0];
    assert_eq!(first.name, "blacklist");
    assert_eq!(first.header_lines.len(), 6);
    assert_eq!(first.header("Type"), Some("hash:ip"));
    assert_eq!(first.header("Size in memory"), Some("1024"));
    assert_eq!(first.member_lines.len(), 2);

    let member = &first.member_lines[0];
    assert_eq!(member.primary, "10.0.0.1");
    let names: Vec<_> = member.options.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["packets", "bytes", "comment"]);
    assert_eq!(member.options[2].value.as_deref(), Some("first host"));

    let flagged = &first.member_lines[1];
    assert_eq!(flagged.options.last().map(|t| t.name.as_str()), Some("nomatch"));
    assert_eq!(flagged.options.last().and_then(|t| t.value.clone()), None);

    assert_eq!(blocks[1].name, "whitelist");
    assert!(blocks[1].member_lines.is_empty());
}

#[test]
fn test_members_marker_before_any_name_is_rejected() {
    let err = parse_listing("Members:\n10.0.0.1\n", &default_config().parser).unwrap_err();
    assert_eq!(err, StructureError::MembersOutsideHeader { line_number: 1 });
}

#[test]
fn test_name_inside_open_header_is_rejected() {
    let err = parse_listing("Name: a\nType: hash:ip\nName: b\n", &default_config().parser)
        .unwrap_err();
    assert_eq!(
        err,
        StructureError::NameInsideHeader {
            line_number: 3,
            name: "b".into(),
            open: "a".into(),
        }
    );
}

#[test]
fn test_line_before_any_set_is_rejected() {
    let err = parse_listing("\nType: hash:ip\n", &default_config().parser).unwrap_err();
    assert!(matches!(
        err,
        StructureError::LineOutsideBlock { line_number: 2, .. }
    ));
}

#[test]
fn test_second_members_marker_is_rejected() {
    let err = parse_listing("Name: a\nMembers:\nMembers:\n", &default_config().parser)
        .unwrap_err();
    assert_eq!(err, StructureError::MembersOutsideHeader { line_number: 3 });
}

#[test]
fn test_set_with_open_header_at_end_is_dropped() {
    let text = "Name: a\nMembers:\n1.1.1.1\nName: b\nType: hash:ip\n";
    let blocks = parse_listing(text, &default_config().parser).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "a");
}

#[test]
fn test_parser_events_and_abandon() {
    let rules = &default_config().parser;
    let mut parser = BlockParser::new(rules);

    assert_eq!(
        parser.push_line("Name: a").unwrap(),
        Some(ParseEvent::Opened("a".into()))
    );
    assert_eq!(parser.push_line("   ").unwrap(), None);
    assert!(matches!(
        parser.push_line("Type: hash:ip").unwrap(),
        Some(ParseEvent::Header(_))
    ));
    assert_eq!(parser.state(), ParserState::InHeader);
    assert_eq!(parser.current_set(), Some("a"));

    assert_eq!(parser.abandon(), Some("a".to_string()));
    assert_eq!(parser.state(), ParserState::AwaitingName);

    // after abandoning, the next set parses normally
    assert!(parser.push_line("Name: b").is_ok());
    assert_eq!(
        parser.push_line("Members:").unwrap(),
        Some(ParseEvent::MembersOpened)
    );
    assert_eq!(parser.finish(), None);
}

#[test]
fn test_custom_markers_from_config() {
    let mut rules = default_config().parser.clone();
    rules.name_marker = "Set:".into();
    rules.members_marker = "Entries:".into();

    let blocks = parse_listing("Set: x\nType: bitmap:port\nEntries:\n80\n", &rules).unwrap();
    assert_eq!(blocks[0].name, "x");
    assert_eq!(blocks[0].member_lines[0].primary, "80");
}
