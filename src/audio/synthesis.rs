//! Procedural music used when no clip or input device is chosen.

/// Glicol composition: sub bass, filtered saw lead and a noise hat,
/// spread across the low, mid and high bands.
pub const GLICOL_COMPOSITION: &str = r#"
~gate: speed 2.0 >> seq 60 _60 _~a 48
~a: choose 48 48 48 72 0 0 0
~amp: ~gate >> envperc 0.001 0.1
~pit: ~gate >> mul 261.63
~lead: saw ~pit >> mul ~amp >> lpf ~mod 5.0 >> mul 0.1
~mod: sin 0.2 >> mul 1300 >> add 1500
~bass: sin 55 >> mul ~amp >> mul 0.3
~hgate: speed 8.0 >> seq 60
~hamp: ~hgate >> envperc 0.001 0.03
~hat: noise 42 >> mul ~hamp >> hpf 7000 1.0 >> mul 0.05
o: mix ~lead ~bass ~hat >> plate 0.1
"#;
