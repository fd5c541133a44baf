// Host-side tests for pitch, pattern and note-value parsing.

use art_core::*;

#[test]
fn midi_to_hz_matches_a4_and_octave() {
    let a4 = midi_to_hz(69.0);
    assert!((a4 - 440.0).abs() < 1e-4);
    let a5 = midi_to_hz(81.0);
    assert!((a5 - 880.0).abs() < 1e-3);
    assert!((a5 / a4 - 2.0).abs() < 1e-4);
}

#[test]
fn midi_to_hz_is_monotonic_over_range() {
    let mut prev = midi_to_hz(20.0);
    for m in 21..=100 {
        let f = midi_to_hz(m as f32);
        assert!(f > prev, "frequency not increasing at midi {m}");
        prev = f;
    }
}

#[test]
fn pitch_names_follow_scientific_notation() {
    assert_eq!(Pitch::parse("C4").unwrap().midi, 60);
    assert_eq!(Pitch::parse("A4").unwrap().midi, 69);
    assert_eq!(Pitch::parse("D#2").unwrap().midi, 39);
    assert_eq!(Pitch::parse("Eb3").unwrap().midi, 51);
    assert_eq!(Pitch::parse("C-1").unwrap().midi, 0);
    assert!((Pitch::parse("A4").unwrap().hz() - 440.0).abs() < 1e-4);
    assert_eq!(
        Pitch::parse("H2"),
        Err(MusicError::InvalidPitch("H2".into()))
    );
    assert!(Pitch::parse("C").is_err());
}

#[test]
fn bass_pattern_has_a_chord_in_second_place() {
    let steps = parse_pattern("C2 [D#2 D2] G#2 G2").unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0], Step::Note(Pitch::from_midi(36)));
    match &steps[1] {
        Step::Chord(pitches) => {
            let midis: Vec<i32> = pitches.iter().map(|p| p.midi).collect();
            assert_eq!(midis, vec![39, 38]);
        }
        other => panic!("expected chord, got {other:?}"),
    }
    assert_eq!(steps[3], Step::Note(Pitch::from_midi(43)));
}

#[test]
fn triggers_and_single_note_groups() {
    assert_eq!(parse_pattern("x x . X").unwrap(), vec![Step::Trigger; 4]);
    assert_eq!(
        parse_pattern("[C4], E4").unwrap(),
        vec![
            Step::Note(Pitch::from_midi(60)),
            Step::Note(Pitch::from_midi(64))
        ]
    );
}

#[test]
fn malformed_patterns_are_rejected() {
    assert_eq!(parse_pattern(""), Err(MusicError::EmptyPattern));
    assert_eq!(parse_pattern("   "), Err(MusicError::EmptyPattern));
    assert_eq!(parse_pattern("[]"), Err(MusicError::EmptyPattern));
    assert_eq!(parse_pattern("C4 [E4"), Err(MusicError::UnbalancedChord));
    assert_eq!(parse_pattern("C4 ]"), Err(MusicError::UnbalancedChord));
    assert_eq!(parse_pattern("[C4 [D4]]"), Err(MusicError::UnbalancedChord));
    assert!(matches!(parse_pattern("[x C4]"), Err(MusicError::InvalidPitch(_))));
    assert_eq!(
        parse_pattern("C2147483647"),
        Err(MusicError::InvalidPitch("C2147483647".into()))
    );
    assert!(matches!(parse_pattern("A4 Cb-2147483648"), Err(MusicError::InvalidPitch(_))));
}

#[test]
fn sequences_reject_non_positive_subdivisions() {
    assert_eq!(
        Sequence::from_pattern("C4", 0.0, 0, NoteValue::Quarter).unwrap_err(),
        MusicError::InvalidSubdivision(0.0)
    );
    assert!(Sequence::from_pattern("C4", f64::NAN, 0, NoteValue::Quarter).is_err());
    assert!(Sequence::from_pattern("C4", -1.0, 0, NoteValue::Quarter).is_err());
}

#[test]
fn default_voices_use_the_piece_envelopes() {
    let fm = VoiceKind::Fm.envelope();
    assert_eq!((fm.attack, fm.release), (0.01, 0.5));
    let noise = VoiceKind::Noise.envelope();
    assert_eq!(noise.sustain, 0.0);
    // Percussive: silent once attack and decay are done even while held.
    assert_eq!(noise.gain_at(0.2, 1.0), 0.0);
}
