use std::sync::Arc;

use super::*;
use crate::search::testutil::{assert_close, hooks, phrase_table, test_opts, FixedSource};
use crate::settings::SearchAlgorithm;
use crate::source::{Sentence, Span};

fn texts(list: &[Translation]) -> Vec<String> {
    list.iter().map(Translation::text).collect()
}

#[test]
fn monotone_best() {
    let table = phrase_table();
    let s = Sentence::parse("das haus ist klein");
    let t = translate(&table, &s, &test_opts(), &hooks()).unwrap();
    assert_eq!(t.text(), "the house is small");
    assert_close(t.score, -1.1);
    let spans: Vec<_> = t.segments.iter().map(|seg| seg.span).collect();
    assert_eq!(spans, vec![Span::new(0, 2), Span::new(2, 4)]);
    assert_eq!(t.segments[1].target.join(" "), "is small");
}

#[test]
fn cube_pruning_agrees_with_exhaustive_expansion() {
    let table = phrase_table();
    let s = Sentence::parse("das haus ist klein");
    let opts = SearchOptions {
        algorithm: SearchAlgorithm::CubePruning,
        ..test_opts()
    };
    let t = translate(&table, &s, &opts, &hooks()).unwrap();
    assert_eq!(t.text(), "the house is small");
    assert_close(t.score, -1.1);
}

#[test]
fn distinct_nbest_skips_repeated_outputs() {
    let table = phrase_table();
    let s = Sentence::parse("das haus ist klein");
    let list = translate_nbest(&table, &s, 3, &test_opts(), &hooks()).unwrap();
    // "that house" and "the home" tie at -1.8; the older hypothesis wins
    assert_eq!(
        texts(&list),
        vec!["the house is small", "the house is little", "the home is small"]
    );
    assert_close(list[1].score, -1.7);
    assert_close(list[2].score, -1.8);
}

#[test]
fn plain_nbest_walks_recombined_derivations() {
    let table = phrase_table();
    let s = Sentence::parse("das haus ist klein");
    let opts = SearchOptions {
        distinct_nbest: false,
        ..test_opts()
    };
    let list = translate_nbest(&table, &s, 3, &opts, &hooks()).unwrap();
    assert_eq!(list.len(), 3);
    assert!(list.iter().all(|t| t.text() == "the house is small"));
    let scores: Vec<_> = list.iter().map(|t| t.score).collect();
    assert_close(scores[0], -1.1);
    assert_close(scores[1], -1.2);
    assert_close(scores[2], -1.3);
}

#[test]
fn unknown_word_passes_through() {
    let table = phrase_table();
    let s = Sentence::parse("das auto");
    let t = translate(&table, &s, &test_opts(), &hooks()).unwrap();
    assert_eq!(t.text(), "the auto");
    assert_close(t.score, -100.5);
}

#[test]
fn empty_input_translates_to_nothing() {
    let table = phrase_table();
    let t = translate(&table, &Sentence::parse("  "), &test_opts(), &hooks()).unwrap();
    assert!(t.words.is_empty());
    assert_eq!(t.score, 0.0);
}

#[test]
fn uncovered_word_is_no_translation() {
    let mut source = FixedSource::default();
    source.word(Span::new(0, 1), "A", -1.0);
    let s = Sentence::parse("a b");
    let err = translate(&source, &s, &test_opts(), &hooks()).unwrap_err();
    assert_eq!(err, DecodeError::NoTranslation);
}

#[test]
fn cancelled_decode_stops() {
    let table = phrase_table();
    let cancel = CancelToken::new();
    cancel.cancel();
    let h = hooks().with_cancel(cancel);
    let err = translate(&table, &Sentence::parse("das haus"), &test_opts(), &h).unwrap_err();
    assert_eq!(err, DecodeError::Cancelled);
}

fn two_words() -> FixedSource {
    let mut source = FixedSource::default();
    source
        .word(Span::new(0, 1), "A", -1.0)
        .word(Span::new(1, 2), "B", -1.0);
    source
}

#[test]
fn reordering_needs_distortion_room() {
    let source = two_words();
    let s = Sentence::parse("a b");

    let monotone = translate_nbest(&source, &s, 5, &test_opts(), &hooks()).unwrap();
    assert_eq!(texts(&monotone), vec!["A B"]);

    let free = SearchOptions {
        max_distortion: None,
        ..test_opts()
    };
    let mut both = texts(&translate_nbest(&source, &s, 5, &free, &hooks()).unwrap());
    both.sort();
    assert_eq!(both, vec!["A B", "B A"]);
}

#[test]
fn distortion_weight_penalizes_jumps() {
    let source = two_words();
    let s = Sentence::parse("a b");
    let opts = SearchOptions {
        max_distortion: None,
        ..test_opts()
    };
    let h = SearchHooks::new(Arc::new(DefaultScoreFunction::new(1.0)));
    let list = translate_nbest(&source, &s, 2, &opts, &h).unwrap();
    assert_eq!(texts(&list), vec!["A B", "B A"]);
    assert_close(list[0].score, -2.0);
    // jumps of 1 and 2, then 1 back to the end
    assert_close(list[1].score, -6.0);
}

#[test]
fn tiny_stacks_still_translate() {
    let table = phrase_table();
    let s = Sentence::parse("das haus ist klein");
    for algorithm in [SearchAlgorithm::Normal, SearchAlgorithm::CubePruning] {
        let opts = SearchOptions {
            algorithm,
            stack_size: 1,
            pop_limit: 2,
            ..test_opts()
        };
        let t = translate(&table, &s, &opts, &hooks()).unwrap();
        assert_eq!(t.words.len(), 4);
    }
}

#[test]
fn graph_exposes_finals_and_stats() {
    let table = phrase_table();
    let s = Sentence::parse("das haus ist klein");
    let graph = search_phrase(&table, &s, &test_opts(), &hooks(), 3).unwrap();
    assert_eq!(graph.finals().len(), 2);
    let (best, _) = graph.finals()[0];
    assert!(!graph.alternates(best).is_empty());
    assert!(graph.stats().created >= graph.arena().len() - 1);
    assert!(graph.stats().recombined > 0);
}

fn recombining_options() -> FixedSource {
    let mut source = FixedSource::default();
    source
        .word(Span::new(0, 2), "a", -1.0)
        .word(Span::new(0, 2), "a", -1.1)
        .word(Span::new(0, 2), "c", -1.2);
    source
}

#[test]
fn distinct_nbest_keeps_every_alternate() {
    let source = recombining_options();
    let opts = SearchOptions {
        stack_size: 1,
        context_words: 0,
        ..test_opts()
    };
    let list = translate_nbest(&source, &Sentence::parse("x y"), 2, &opts, &hooks()).unwrap();
    assert_eq!(texts(&list), vec!["a", "c"]);
    assert_close(list[1].score, -1.2);
}

#[test]
fn plain_nbest_caps_alternates_at_the_list_size() {
    let source = recombining_options();
    let opts = SearchOptions {
        stack_size: 1,
        context_words: 0,
        distinct_nbest: false,
        ..test_opts()
    };
    let list = translate_nbest(&source, &Sentence::parse("x y"), 2, &opts, &hooks()).unwrap();
    assert_eq!(texts(&list), vec!["a", "a"]);
    assert_close(list[0].score, -1.0);
    assert_close(list[1].score, -1.1);
}
