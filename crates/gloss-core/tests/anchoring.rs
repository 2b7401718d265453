//! End-to-end anchoring behaviour against the in-memory DOM.

use gloss_core::{
    Anchor, AnnotationStats, DocumentIndex, DocumentKey, DomPoint, DomRange, DomTree, GlossConfig,
    GlossError, HighlightColor, MemDom, MemoryStorage, NodeId, Point, Rejection, SelectionSnapshot,
    Session, UiSignal, normalize_path, text::flatten_text,
};

const SUTRA: &str = concat!(
    r#"<main><nav><p>Contents</p></nav>"#,
    r#"<div class="md-content">"#,
    r#"<h1 id="heart-sutra">Heart Sutra</h1>"#,
    r#"<p>Form is <em>emptiness</em>, emptiness is <strong>form</strong>.</p>"#,
    r#"<ul><li>first item</li><li>second <a href="/x/">linked</a> item</li></ul>"#,
    r#"<p>0123456789abcdefghijklmnopqrstuvwxyz</p>"#,
    r#"</div></main>"#
);

type TestSession = Session<MemoryStorage, NodeId>;

fn mount(storage: &MemoryStorage, path: &str) -> (MemDom, TestSession) {
    let mut dom = MemDom::parse(SUTRA).unwrap();
    let mut session = Session::new(GlossConfig::default(), storage.clone());
    session.on_document_mount(&mut dom, path);
    session.take_signals();
    (dom, session)
}

/// Text node `n` (in document order) under the `i`th element with `tag`.
fn text_in(dom: &MemDom, tag: &str, i: usize, n: usize) -> NodeId {
    let el = dom.find_all_tags(tag)[i];
    gloss_core::text::text_nodes(dom, &el)
        .nth(n)
        .map(|span| span.node)
        .unwrap()
}

fn selection(start: (NodeId, usize), end: (NodeId, usize)) -> Option<SelectionSnapshot<NodeId>> {
    Some(SelectionSnapshot {
        range: DomRange::new(DomPoint::new(start.0, start.1), DomPoint::new(end.0, end.1)),
        pointer: Point::new(0.0, 100.0),
    })
}

fn highlight(
    dom: &mut MemDom,
    session: &mut TestSession,
    start: (NodeId, usize),
    end: (NodeId, usize),
) -> Result<Option<Anchor>, GlossError> {
    session.pointer_down();
    if let Err(rejection) = session.selection_finished(&*dom, selection(start, end)) {
        panic!("selection rejected: {rejection:?}");
    }
    session.commit_candidate(dom, None)
}

fn last_paragraph(dom: &MemDom) -> NodeId {
    dom.find_all_tags("p")[2]
}

#[test]
fn test_offsets_match_block_text() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let start = text_in(&dom, "p", 1, 1); // "emptiness" in <em>
    let end = text_in(&dom, "p", 1, 2); // ", emptiness is "

    let anchor = highlight(&mut dom, &mut session, (start, 0), (end, 11))
        .unwrap()
        .unwrap();

    let block = dom.find_all_tags("p")[1];
    let flattened = flatten_text(&dom, &block);
    assert_eq!(anchor.text, "emptiness, emptiness");
    assert_eq!(
        gloss_core::text::utf16_slice(&flattened, anchor.range()),
        Some(anchor.text.as_str())
    );
    assert_eq!(anchor.end_offset - anchor.start_offset, anchor.text.encode_utf16().count());
}

#[test]
fn test_build_persist_repaint_round_trip() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let text = text_in(&dom, "li", 0, 0);
    let anchor = highlight(&mut dom, &mut session, (text, 0), (text, 5))
        .unwrap()
        .unwrap();
    assert_eq!(anchor.locator.to_string(), "ul > li");

    // Fresh page load of the same document.
    let (dom, session) = mount(&storage, "/sutras/heart/index.html");
    let li = dom.find_all_tags("li")[0];
    let html = dom.inner_html(&li).replace(anchor.id.as_str(), "ID");
    insta::assert_snapshot!(
        html,
        @r#"<span class="db-highlight" data-id="ID" data-color="yellow">first</span> item"#
    );
    assert_eq!(session.stats(), AnnotationStats { highlights: 1, memos: 0 });
}

#[test]
fn test_repaint_is_idempotent() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let text = text_in(&dom, "p", 2, 0);
    highlight(&mut dom, &mut session, (text, 0), (text, 3)).unwrap();

    let root = dom.first_by_class("md-content").unwrap();
    let before = dom.inner_html(&root);
    let report = session.repaint(&mut dom).unwrap();
    assert_eq!(report.already_painted, 1);
    assert_eq!(report.painted, 0);
    assert_eq!(dom.inner_html(&root), before);
}

#[test]
fn test_overlapping_selection_is_rejected() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let text = text_in(&dom, "p", 2, 0);
    highlight(&mut dom, &mut session, (text, 5), (text, 15)).unwrap();

    // After painting, the block is split into "01234" | marker | "fghij...".
    let head = text_in(&dom, "p", 2, 0);
    let tail = text_in(&dom, "p", 2, 2);

    session.pointer_down();
    assert_eq!(
        session.selection_finished(&dom, selection((head, 2), (tail, 3))),
        Err(Rejection::SpansHighlight)
    );
    let inside = text_in(&dom, "p", 2, 1);
    assert_eq!(
        session.selection_finished(&dom, selection((inside, 2), (tail, 3))),
        Err(Rejection::TouchesHighlight)
    );

    // Directly adjacent on both sides is allowed.
    assert!(session.selection_finished(&dom, selection((head, 0), (head, 5))).is_ok());
    assert!(session.selection_finished(&dom, selection((tail, 0), (tail, 4))).is_ok());
}

#[test]
fn test_identity_is_stable_across_deployments() {
    let index = DocumentIndex::from_json(
        r#"[{"id": "/", "title": "Home"}, {"id": "/sutras/01/", "title": "One"}]"#,
    )
    .unwrap();
    for observed in ["/base/sutras/01/", "/sutras/01/", "/sutras/01/index.html"] {
        assert_eq!(
            index.resolve(&normalize_path(observed)),
            DocumentKey::new("/sutras/01/"),
            "{observed}"
        );
    }
    // The root descriptor must not swallow every path ending in "/".
    assert_eq!(index.resolve("/other/"), DocumentKey::new("/other/"));
    assert_eq!(index.resolve(&normalize_path("/index.html")), DocumentKey::new("/"));
}

#[test]
fn test_cross_block_selection_is_refused_with_notice() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let first = text_in(&dom, "li", 0, 0);
    let second = text_in(&dom, "li", 1, 0);

    let result = highlight(&mut dom, &mut session, (first, 6), (second, 3)).unwrap();
    assert_eq!(result, None);
    assert!(
        session
            .take_signals()
            .iter()
            .any(|s| matches!(s, UiSignal::Notice(_)))
    );
    assert!(session.anchors().is_empty());
}

#[test]
fn test_stale_anchor_does_not_block_others() {
    let bundle = serde_json::json!({
        "bookmarks": [],
        "learning_status": {},
        "annotations": {"/sutras/heart/": [
            {"id": "stale", "selector": "p:nth-of-type(2)", "startOffset": 0,
             "endOffset": 5, "text": "XXXXX", "color": "yellow", "created_at": 1},
            {"id": "fresh", "selector": "p:nth-of-type(2)", "startOffset": 10,
             "endOffset": 15, "text": "abcde", "color": "green", "created_at": 2},
            {"id": "gone", "selector": ".md-content p:nth-of-type(9)", "startOffset": 0,
             "endOffset": 5, "text": "Heart", "color": "yellow", "created_at": 3}
        ]}
    });
    let storage = MemoryStorage::with_contents(bundle.to_string());
    let mut dom = MemDom::parse(SUTRA).unwrap();
    let mut session: TestSession = Session::new(GlossConfig::default(), storage.clone());

    let report = session.on_document_mount(&mut dom, "/sutras/heart/");
    assert_eq!(report.mismatched, 1);
    assert_eq!(report.painted, 1);
    assert_eq!(report.orphaned, 1);
    insta::assert_snapshot!(
        dom.inner_html(&last_paragraph(&dom)),
        @r#"0123456789<span class="db-highlight" data-id="fresh" data-color="green">abcde</span>fghijklmnopqrstuvwxyz"#
    );

    // Nothing was dropped from storage.
    assert_eq!(session.anchors().len(), 3);
}

#[test]
fn test_multi_node_wrap_and_delete_restore() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let block = dom.find_all_tags("p")[1];
    let original = dom.inner_html(&block);

    let start = text_in(&dom, "p", 1, 0); // "Form is "
    let end = text_in(&dom, "p", 1, 4); // "."
    let anchor = highlight(&mut dom, &mut session, (start, 5), (end, 0))
        .unwrap()
        .unwrap();
    assert_eq!(anchor.text, "is emptiness, emptiness is form");

    let html = dom
        .inner_html(&block)
        .replace(anchor.id.as_str(), "ID");
    insta::assert_snapshot!(
        html,
        @r#"Form <span class="db-highlight" data-id="ID" data-color="yellow">is </span><em><span class="db-highlight" data-id="ID" data-color="yellow">emptiness</span></em><span class="db-highlight" data-id="ID" data-color="yellow">, emptiness is </span><strong><span class="db-highlight" data-id="ID" data-color="yellow">form</span></strong>."#
    );

    session
        .save_memo_for(&mut dom, &anchor.id, Some("the heart".into()))
        .unwrap();
    assert!(dom.inner_html(&block).contains("db-has-memo"));

    session.delete_anchor(&mut dom, &anchor.id).unwrap();
    assert_eq!(dom.inner_html(&block), original);
    assert_eq!(
        flatten_text(&dom, &block),
        "Form is emptiness, emptiness is form."
    );
    assert!(session.anchors().is_empty());
}

#[test]
fn test_highlight_color_choice_is_stored() {
    let storage = MemoryStorage::new();
    let (mut dom, mut session) = mount(&storage, "/sutras/heart/");
    let text = text_in(&dom, "h1", 0, 0);

    session.pointer_down();
    session
        .selection_finished(&dom, selection((text, 0), (text, 5)))
        .unwrap();
    let anchor = session
        .commit_candidate(&mut dom, Some(HighlightColor::Pink))
        .unwrap()
        .unwrap();
    assert_eq!(anchor.locator.to_string(), "#heart-sutra");

    let written: serde_json::Value = serde_json::from_str(&storage.contents().unwrap()).unwrap();
    assert_eq!(written["annotations"]["/sutras/heart/"][0]["color"], "pink");
    assert_eq!(written["annotations"]["/sutras/heart/"][0]["selector"], "#heart-sutra");
}
