//! Tests for the structured description block and the merge rule.

use ncdbookmarks::types::description::*;

#[test]
fn compose_uses_fixed_section_order() {
    let wire = compose_description("text", "2022-03-04", "highlight");
    assert_eq!(
        wire,
        "text\n\n# BOOKMARKED\n2022-03-04\n\n# LLM_DESCRIPTION\n###LLM###\n\n# ANNOTATIONS\nhighlight\n"
    );
}

#[test]
fn parse_recovers_composed_block() {
    let wire = compose_description("text", "2022", "hl");
    let block = DescriptionBlock::parse(&wire).unwrap();
    assert_eq!(block, DescriptionBlock::new("text", "2022", "hl"));
    assert!(block.needs_generation());
    assert_eq!(block.compose(), wire);
}

#[test]
fn parse_rejects_plain_text() {
    assert_eq!(DescriptionBlock::parse("just a note"), None);
    assert!(!DescriptionBlock::is_composed("# BOOKMARKED only"));
}

#[test]
fn merge_keeps_existing_primary() {
    assert_eq!(merge_description("new", "old"), "old# PREVIOUS\nnew");
    assert_eq!(merge_description("same", "same"), "same");
    assert_eq!(merge_description("", "old"), "old");
    assert_eq!(merge_description("new", ""), "new");
}

#[test]
fn fill_placeholder_replaces_token() {
    let wire = compose_description("t", "b", "a");
    let filled = fill_placeholder(&wire, "summary");
    assert!(!filled.contains(LLM_PLACEHOLDER));
    assert!(filled.contains("# LLM_DESCRIPTION\nsummary\n"));
}

#[test]
fn prepare_for_generation_on_native_bookmarks() {
    assert_eq!(
        prepare_for_generation("").as_deref(),
        Some("# LLM_DESCRIPTION\n###LLM###\n")
    );
    assert_eq!(
        prepare_for_generation("line\n").as_deref(),
        Some("line\n\n# LLM_DESCRIPTION\n###LLM###\n")
    );
}
