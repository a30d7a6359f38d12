use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use comet_mcda::{
    co_label, Comet, ExpertFunction, Judgement, ManualExpert, PairQuestion, Prompter,
    ScriptedPrompter, StreamPrompter,
};

fn names(n: &[&str]) -> Vec<String> {
    n.iter().map(|s| s.to_string()).collect()
}

#[test]
fn labels_follow_the_spreadsheet_convention() {
    assert_eq!(co_label(0), "A");
    assert_eq!(co_label(1), "B");
    assert_eq!(co_label(25), "Z");
    assert_eq!(co_label(26), "AA");
    assert_eq!(co_label(27), "AB");
    assert_eq!(co_label(51), "AZ");
    assert_eq!(co_label(52), "BA");
    assert_eq!(co_label(701), "ZZ");
    assert_eq!(co_label(702), "AAA");
}

/// Records every question it is asked, always answering a tie.
struct RecordingPrompter {
    log: Arc<Mutex<Vec<(usize, usize, usize, usize, String, String)>>>,
}

impl Prompter for RecordingPrompter {
    fn compare(&mut self, q: &PairQuestion<'_>) -> Judgement {
        self.log.lock().unwrap().push((
            q.pair.0,
            q.pair.1,
            q.number,
            q.total,
            q.labels.0.to_string(),
            q.labels.1.to_string(),
        ));
        Judgement::Tie
    }
}

#[test]
fn questions_walk_the_diagonals_adjacent_pairs_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let expert = ExpertFunction::Manual(ManualExpert::new(
        names(&["price", "quality"]),
        RecordingPrompter { log: log.clone() },
    ));
    // 2x2 lattice: 4 objects, 6 questions.
    Comet::new(vec![vec![0.0, 1.0], vec![0.0, 1.0]], expert).unwrap();

    let log = log.lock().unwrap();
    let pairs: Vec<(usize, usize)> = log.iter().map(|e| (e.0, e.1)).collect();
    assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3), (0, 2), (1, 3), (0, 3)]);

    let numbers: Vec<usize> = log.iter().map(|e| e.2).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    assert!(log.iter().all(|e| e.3 == 6));

    assert_eq!((log[0].4.as_str(), log[0].5.as_str()), ("A", "B"));
    assert_eq!((log[5].4.as_str(), log[5].5.as_str()), ("A", "D"));
}

#[test]
fn all_ties_give_a_flat_preference_table() {
    let expert = ExpertFunction::Manual(ManualExpert::new(
        names(&["price", "quality"]),
        ScriptedPrompter::new([Judgement::Tie]),
    ));
    let comet = Comet::new(vec![vec![0.0, 1.0], vec![0.0, 1.0]], expert).unwrap();
    assert!(comet.p().iter().all(|&v| v == 0.5));
}

#[test]
fn a_scripted_total_order_pins_the_preference_scale() {
    // One answer, cycled: the first object of every pair wins, so the
    // lattice order is the preference order reversed.
    let expert = ExpertFunction::Manual(ManualExpert::new(
        names(&["price"]),
        ScriptedPrompter::new([Judgement::FirstBetter]),
    ));
    let comet = Comet::new(vec![vec![0.0, 0.5, 1.0]], expert).unwrap();
    assert_eq!(comet.p(), &[1.0, 0.5, 0.0]);

    let mej = comet.mej().values();
    assert_eq!(mej[(0, 1)], 1.0);
    assert_eq!(mej[(1, 0)], 0.0);
    assert_eq!(mej[(2, 2)], 0.5);
}

#[test]
fn identical_scripts_reproduce_the_same_judgements() {
    let answers = [
        Judgement::FirstBetter,
        Judgement::Tie,
        Judgement::SecondBetter,
    ];
    let build = || {
        Comet::new(
            vec![vec![0.0, 0.5, 1.0]],
            ExpertFunction::Manual(ManualExpert::new(
                names(&["price"]),
                ScriptedPrompter::new(answers),
            )),
        )
        .unwrap()
    };
    let (a, b) = (build(), build());
    assert_eq!(a.mej().values(), b.mej().values());
    assert_eq!(a.p(), b.p());
}

/// Shared sink so the prompter's transcript stays inspectable.
#[derive(Clone)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn question<'a>(criteria: &'a [String], objects: (&'a [f64], &'a [f64])) -> PairQuestion<'a> {
    PairQuestion {
        pair: (0, 1),
        number: 1,
        total: 1,
        labels: ("A", "B"),
        objects,
        criteria_names: criteria,
    }
}

#[test]
fn stream_prompter_reads_labels_ties_and_reasks_garbage() {
    let criteria = names(&["price"]);
    let objects: (&[f64], &[f64]) = (&[0.0], &[1.0]);

    let sink = SharedBuf(Arc::new(Mutex::new(Vec::new())));
    let mut prompter = StreamPrompter::new(Cursor::new("B\n"), sink.clone());
    assert_eq!(
        prompter.compare(&question(&criteria, objects)),
        Judgement::SecondBetter
    );
    let transcript = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(transcript.contains("A: price=0"));
    assert!(transcript.contains("B: price=1"));

    let mut prompter = StreamPrompter::new(Cursor::new("A\n"), std::io::sink());
    assert_eq!(
        prompter.compare(&question(&criteria, objects)),
        Judgement::FirstBetter
    );

    // An empty line is a tie.
    let mut prompter = StreamPrompter::new(Cursor::new("\n"), std::io::sink());
    assert_eq!(
        prompter.compare(&question(&criteria, objects)),
        Judgement::Tie
    );

    // Garbage is re-asked until a valid answer arrives.
    let sink = SharedBuf(Arc::new(Mutex::new(Vec::new())));
    let mut prompter = StreamPrompter::new(Cursor::new("whatever\nB\n"), sink.clone());
    assert_eq!(
        prompter.compare(&question(&criteria, objects)),
        Judgement::SecondBetter
    );
    let transcript = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(transcript.contains("Valid answers"));
}

#[test]
fn an_exhausted_stream_degrades_to_a_tie() {
    let criteria = names(&["price"]);
    let objects: (&[f64], &[f64]) = (&[0.0], &[1.0]);
    let mut prompter = StreamPrompter::new(Cursor::new(""), std::io::sink());
    assert_eq!(
        prompter.compare(&question(&criteria, objects)),
        Judgement::Tie
    );
}

#[test]
fn stream_driven_identification_end_to_end() {
    // 2-CO lattice, a single question answered in favour of the upper
    // landmark.
    let expert = ExpertFunction::Manual(ManualExpert::new(
        names(&["price"]),
        StreamPrompter::new(Cursor::new("B\n"), std::io::sink()),
    ));
    let comet = Comet::new(vec![vec![0.0, 1.0]], expert).unwrap();
    assert_eq!(comet.p(), &[0.0, 1.0]);
}
