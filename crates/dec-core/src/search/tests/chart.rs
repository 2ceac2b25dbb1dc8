use super::*;
use crate::search::testutil::{assert_close, grammar, hooks, test_opts, FixedSource};
use crate::source::{Sentence, Span, Symbol, TargetPhrase};

fn binary_rule() -> TargetPhrase {
    TargetPhrase::new(vec![Symbol::NonTerminal(0), Symbol::NonTerminal(1)], 0.0)
}

#[test]
fn hierarchical_rule_wraps_child() {
    let g = grammar();
    let t = translate_chart(&g, &Sentence::parse("ne mange pas"), &test_opts(), &hooks()).unwrap();
    assert_eq!(t.text(), "not eat");
    assert_close(t.score, -0.7);
}

#[test]
fn rule_reorders_children() {
    let g = grammar();
    let t = translate_chart(&g, &Sentence::parse("chat de maison"), &test_opts(), &hooks()).unwrap();
    assert_eq!(t.text(), "house of cat");
    assert_close(t.score, -0.6);
    let spans: Vec<_> = t.segments.iter().map(|seg| seg.span).collect();
    assert_eq!(spans, vec![Span::new(0, 3), Span::new(2, 3), Span::new(0, 1)]);
}

#[test]
fn nested_rules_build_the_whole_tree() {
    let g = grammar();
    let t = translate_chart(&g, &Sentence::parse("ne chat de maison pas"), &test_opts(), &hooks())
        .unwrap();
    assert_eq!(t.text(), "not house of cat");
    assert_close(t.score, -1.1);
    let segments: Vec<_> = t
        .segments
        .iter()
        .map(|seg| (seg.span, seg.target.join(" ")))
        .collect();
    assert_eq!(
        segments,
        vec![
            (Span::new(0, 5), "not".to_string()),
            (Span::new(1, 4), "of".to_string()),
            (Span::new(3, 4), "house".to_string()),
            (Span::new(1, 2), "cat".to_string()),
        ]
    );
}

#[test]
fn chart_nbest_varies_the_child() {
    let g = grammar();
    let list =
        translate_chart_nbest(&g, &Sentence::parse("ne mange pas"), 2, &test_opts(), &hooks())
            .unwrap();
    let texts: Vec<_> = list.iter().map(Translation::text).collect();
    assert_eq!(texts, vec!["not eat", "not eats"]);
    assert_close(list[1].score, -0.9);
}

#[test]
fn glue_joins_unrelated_words() {
    let g = grammar();
    let t = translate_chart(&g, &Sentence::parse("chat maison"), &test_opts(), &hooks()).unwrap();
    assert_eq!(t.text(), "cat house");
    assert_close(t.score, -1.3);
}

fn scored_cells() -> FixedSource {
    let mut source = FixedSource::default();
    source
        .word(Span::new(0, 1), "a1", 10.0)
        .word(Span::new(0, 1), "a2", 7.0)
        .word(Span::new(0, 1), "a3", 2.0)
        .word(Span::new(1, 2), "b1", 9.0)
        .word(Span::new(1, 2), "b2", 1.0);
    source
}

#[test]
fn cell_pops_top_combinations_in_order() {
    let mut source = scored_cells();
    source.rule(Span::new(0, 2), binary_rule(), vec![Span::new(0, 1), Span::new(1, 2)]);
    let opts = SearchOptions {
        chart_pop_limit: 3,
        context_words: 1,
        ..test_opts()
    };
    let graph = search_chart(&source, &Sentence::parse("a b"), &opts, &hooks(), 1).unwrap();
    let scores: Vec<_> = graph.finals().iter().map(|(_, s)| *s).collect();
    assert_eq!(scores, vec![19.0, 16.0, 11.0]);
    assert_eq!(graph.stats().popped, 3 + 2 + 3);

    let list = graph.nbest(3, true, 3);
    let texts: Vec<_> = list.iter().map(Translation::text).collect();
    assert_eq!(texts, vec!["a1 b1", "a2 b1", "a1 b2"]);
}

#[test]
fn child_outside_span_is_malformed() {
    let mut source = scored_cells();
    source.rule(Span::new(0, 2), binary_rule(), vec![Span::new(0, 1), Span::new(1, 3)]);
    let err = translate_chart(&source, &Sentence::parse("a b"), &test_opts(), &hooks())
        .unwrap_err();
    assert!(matches!(err, DecodeError::MalformedCandidate(_)));
}

#[test]
fn missing_child_for_nonterminal_is_malformed() {
    let mut source = scored_cells();
    source.rule(Span::new(0, 2), binary_rule(), vec![Span::new(0, 1)]);
    let err = translate_chart(&source, &Sentence::parse("a b"), &test_opts(), &hooks())
        .unwrap_err();
    assert!(matches!(err, DecodeError::MalformedCandidate(_)));
}

#[test]
fn starved_rule_leaves_top_cell_empty() {
    let mut source = FixedSource::default();
    source
        .word(Span::new(0, 1), "a1", 1.0)
        .rule(Span::new(0, 2), binary_rule(), vec![Span::new(0, 1), Span::new(1, 2)]);
    let err = translate_chart(&source, &Sentence::parse("a b"), &test_opts(), &hooks())
        .unwrap_err();
    assert_eq!(err, DecodeError::NoTranslation);
}

#[test]
fn empty_chart_input() {
    let g = grammar();
    let list = translate_chart_nbest(&g, &Sentence::default(), 3, &test_opts(), &hooks()).unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].words.is_empty());
}
