/// Pitch-to-frequency capability consumed by the coefficient makers.
///
/// The filters only need two things from a tuning system: a multiplier for a
/// (fractional) MIDI note, and the frequency of MIDI note 0. Cutoff pitch is
/// expressed in semitones relative to A440, so the makers ask for
/// `note_to_pitch_ignoring_tuning(pitch + 69) * MIDI_0_FREQ`.
///
/// A host with microtuning support implements this trait on its own tuning
/// table. `EqualTemperament` is the plain 12-TET default.

pub trait TuningProvider {
    /// Frequency of MIDI note 0 in Hz.
    const MIDI_0_FREQ: f32;

    /// Frequency multiplier for a fractional MIDI note, relative to note 0.
    fn note_to_pitch_ignoring_tuning(&self, note: f32) -> f32;
}

/// 12-tone equal temperament anchored at A4 = 440 Hz.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualTemperament;

impl TuningProvider for EqualTemperament {
    /// 440 / 2^(69/12)
    const MIDI_0_FREQ: f32 = 8.175_799;

    fn note_to_pitch_ignoring_tuning(&self, note: f32) -> f32 {
        (note / 12.0).exp2()
    }
}

/// Frequency (Hz) that a provider assigns to a cutoff pitch in semitones from A440.
pub fn pitch_to_frequency<T: TuningProvider>(pitch: f32, provider: &T) -> f32 {
    provider.note_to_pitch_ignoring_tuning(pitch + 69.0) * T::MIDI_0_FREQ
}

/// Inverse of `pitch_to_frequency` for equal temperament.
///
/// Handy for tests and tools that think in Hz rather than semitones.
pub fn pitch_for_frequency(freq_hz: f32) -> f32 {
    12.0 * (freq_hz / 440.0).log2()
}
