//! The header gate keeps a set iff every distinct header filter finds a
//! satisfying header line.

use ipset_filter::config::default_config;
use ipset_filter::evaluator::{EvalOptions, evaluate_block};
use ipset_filter::filter::{FilterArgs, FilterRegistry};
use ipset_filter::parser::parse_listing;
use proptest::prelude::*;

/// Listing text whose i-th header satisfies filter i only when
/// `satisfied[i]` holds. Even indices use a glob, odd ones a comparison.
fn listing(satisfied: &[bool], noise: usize) -> String {
    let mut text = String::from("Name: generated\n");
    for (i, ok) in satisfied.iter().enumerate() {
        if i % 2 == 0 {
            let value = if *ok { "hash:ip" } else { "bitmap:port" };
            text.push_str(&format!("Kind{i}: {value}\n"));
        } else {
            let value = if *ok { 10 } else { 9 };
            text.push_str(&format!("Count{i}: {value}\n"));
        }
    }
    for n in 0..noise {
        text.push_str(&format!("Unrelated{n}: {n}\n"));
    }
    text.push_str("Members:\n");
    text
}

fn filters(k: usize, duplicated: bool) -> FilterArgs {
    let mut args = FilterArgs::default();
    for i in 0..k {
        if i % 2 == 0 {
            args.header_globs.push(format!("Kind{i}:hash:*"));
        } else {
            args.header_compares.push(format!("Count{i}:>=10"));
        }
    }
    if duplicated {
        args.header_globs.extend(args.header_globs.clone());
        args.header_compares.extend(args.header_compares.clone());
    }
    args
}

proptest! {
    #[test]
    fn kept_iff_every_filter_satisfied(
        satisfied in prop::collection::vec(any::<bool>(), 0..8),
        noise in 0usize..4,
        duplicated in any::<bool>(),
    ) {
        let rules = &default_config().parser;
        let registry = FilterRegistry::from_args(&filters(satisfied.len(), duplicated)).unwrap();
        prop_assert_eq!(registry.header_gate_size(), satisfied.len());

        let block = parse_listing(&listing(&satisfied, noise), rules).unwrap().remove(0);
        let result = evaluate_block(&block, &registry, rules, EvalOptions::default()).unwrap();

        prop_assert_eq!(result.kept, satisfied.iter().all(|ok| *ok));
    }

    /// A filter is satisfied by one line no matter how many lines match it.
    #[test]
    fn repeated_matching_lines_count_once(repeats in 1usize..5) {
        let rules = &default_config().parser;
        let mut text = String::from("Name: repeated\n");
        for _ in 0..repeats {
            text.push_str("Type: hash:ip\n");
        }
        text.push_str("Members:\n");

        let registry = FilterRegistry::from_args(&FilterArgs {
            header_globs: vec!["Type:hash:*".into(), "Missing:*".into()],
            ..Default::default()
        })
        .unwrap();
        let block = parse_listing(&text, rules).unwrap().remove(0);
        let result = evaluate_block(&block, &registry, rules, EvalOptions::default()).unwrap();

        prop_assert!(!result.kept);
    }
}
