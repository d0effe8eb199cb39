use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use riffcap_core::codec::chunk::{INFO_ARTIST, INFO_COMMENT, INFO_CREATION_DATE, INFO_PRODUCT, INFO_TITLE, INFO_TRACK};
use riffcap_core::processing::wav_format::downmix_to_mono;
use riffcap_core::{SaveOptions, WavContainer, WavSpec};

use crate::assembler::wav_editor::WavEditor;
use crate::models::error::{EditorError, RenderStage};
use crate::models::file_set::WavFileSet;
use crate::models::report::{RenderReport, TrackReport};
use crate::models::settings::{ChannelLayout, MasterOutputSettings, PerFileOutputSettings};
use crate::processing::leveling::{self, TrackView};
use crate::processing::noise::{self, NoiseGenerator};
use crate::processing::{render, resample};
use crate::storage::report;
use crate::traits::render_observer::RenderObserver;

/// A track that made it through the per-file stages.
struct Pending<'a> {
    index: usize,
    set: &'a WavFileSet,
    settings: &'a PerFileOutputSettings,
    channels: Vec<Vec<f64>>,
    sample_rate: f64,
}

enum Slot<'a> {
    Ready(Pending<'a>),
    Failed(TrackReport),
}

/// Batch renderer for every file set in an editor.
///
/// ```text
/// per set:   decode → trim → filter → volume → loop/one-shot → noise beds
/// batch:     one leveling gain across every surviving track
/// per track: resample → channel layout → encode → write
/// ```
///
/// A failing set is reported with its stage and skipped; the others carry on.
pub struct MasteringPipeline {
    master: MasterOutputSettings,
    observer: Option<Arc<dyn RenderObserver>>,
}

impl MasteringPipeline {
    pub fn new(master: MasterOutputSettings) -> Self {
        Self { master, observer: None }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn RenderObserver>) {
        self.observer = Some(observer);
    }

    pub fn master(&self) -> &MasterOutputSettings {
        &self.master
    }

    /// Render every set in display order. `files[i]` applies to the `i`th set.
    pub fn render(&self, editor: &WavEditor, files: &[PerFileOutputSettings]) -> Result<RenderReport, EditorError> {
        if let Err(e) = self.check(editor, files) {
            if let Some(ref observer) = self.observer {
                observer.on_render_failed(&e);
            }
            return Err(e);
        }
        let count = editor.len();
        log::info!("rendering {} file sets to {}", count, self.master.folder.display());

        let mut slots = Vec::with_capacity(count);
        for (index, (set, settings)) in editor.iter().zip(files).enumerate() {
            if let Some(ref observer) = self.observer {
                observer.on_track_started(index, count);
            }
            match self.render_set(index, set, settings) {
                Ok((channels, sample_rate)) => {
                    slots.push(Slot::Ready(Pending { index, set, settings, channels, sample_rate }));
                }
                Err(e) => {
                    let failed = self.failure(index, set, e);
                    self.notify_finished(&failed);
                    slots.push(Slot::Failed(failed));
                }
            }
        }

        let (slots, gain) = self.level(slots);

        let inputs: Vec<&Path> = editor.iter().flat_map(|s| s.paths()).map(PathBuf::as_path).collect();
        let mut written: Vec<PathBuf> = Vec::new();
        let tracks: Vec<TrackReport> = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Failed(report) => report,
                Slot::Ready(pending) => {
                    let (index, set) = (pending.index, pending.set);
                    let report = match self.finish_track(pending, &inputs, &mut written) {
                        Ok(report) => report,
                        Err(e) => self.failure(index, set, e),
                    };
                    self.notify_finished(&report);
                    report
                }
            })
            .collect();

        let report = RenderReport { tracks, gain };
        self.write_sidecars(editor, files, &report);
        log::info!("render finished: {} of {} tracks written", report.succeeded(), count);
        if let Some(ref observer) = self.observer {
            observer.on_render_finished(&report);
        }
        Ok(report)
    }

    fn check(&self, editor: &WavEditor, files: &[PerFileOutputSettings]) -> Result<(), EditorError> {
        self.master.validate().map_err(|reason| EditorError::InvalidSetting { field: "master output", reason })?;
        if files.len() != editor.len() {
            return Err(EditorError::InvalidSetting {
                field: "file settings",
                reason: format!("{} entries for {} file sets", files.len(), editor.len()),
            });
        }
        Ok(())
    }

    /// Stages 1 through 6 for one set, at the set's effective input rate.
    fn render_set(
        &self,
        index: usize,
        set: &WavFileSet,
        settings: &PerFileOutputSettings,
    ) -> Result<(Vec<Vec<f64>>, f64), EditorError> {
        let path = &set.file.path;
        settings
            .validate()
            .map_err(|reason| EditorError::InvalidSetting { field: "file settings", reason }.at(path, RenderStage::Trim))?;
        let rate = settings.actual_hz.resolve(set.file.spec.sample_rate);

        let decoded = render::decode_set(set).map_err(|e| e.at(path, RenderStage::Decode))?;
        log::debug!("{}: decoded {} frames at {} Hz", path.display(), decoded.first().map_or(0, Vec::len), rate);

        let mut trimmed =
            render::trim(&decoded, &set.labels, settings, rate).map_err(|e| e.at(path, RenderStage::Trim))?;
        drop(decoded);
        render::filter(&mut trimmed.channels, settings, rate);
        render::apply_volume(&mut trimmed.channels, settings.volume, settings.invert);

        let mut channels = render::arrange(trimmed, settings, rate);
        self.add_beds(&mut channels, rate, index);
        Ok((channels, rate))
    }

    fn add_beds(&self, channels: &mut [Vec<f64>], rate: f64, index: usize) {
        let m = &self.master;
        if !m.mains_hum && !m.white_noise {
            return;
        }
        let len = channels.first().map_or(0, Vec::len);
        let mut generator = NoiseGenerator::new(m.noise_seed.map(|s| s.wrapping_add(index as u64)));
        if m.mains_hum {
            let hum = generator.mains_hum(len, rate, m.mains_hz, m.hum_color, m.hum_volume);
            noise::mix_into(channels, &hum);
        }
        if m.white_noise {
            let sigma =
                noise::white_noise_sigma(m.noise_volume, m.noise_temperature, m.noise_resistance, m.noise_bandwidth);
            let bed = generator.white_noise(len, m.noise_kind, sigma);
            noise::mix_into(channels, &bed);
        }
    }

    /// Apply one gain to every ready track.
    fn level<'a>(&self, slots: Vec<Slot<'a>>) -> (Vec<Slot<'a>>, f64) {
        let views: Vec<TrackView<'_>> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Ready(p) => Some(TrackView { channels: &p.channels, sample_rate: p.sample_rate }),
                Slot::Failed(_) => None,
            })
            .collect();
        let gain = leveling::batch_gain(self.master.leveling, &views);
        drop(views);
        log::debug!("batch gain {:.6} ({:?})", gain, self.master.leveling);

        let slots = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Ready(mut p) if gain.is_finite() => {
                    leveling::apply_gain(&mut p.channels, gain);
                    Slot::Ready(p)
                }
                Slot::Ready(p) => {
                    let e = EditorError::InvalidSetting {
                        field: "leveling",
                        reason: format!("gain {} is not finite", gain),
                    };
                    let failed = self.failure(p.index, p.set, e.at(&p.set.file.path, RenderStage::Leveling));
                    self.notify_finished(&failed);
                    Slot::Failed(failed)
                }
                failed => failed,
            })
            .collect();
        (slots, gain)
    }

    /// Stages 8 and 9. `written` holds the outputs of earlier tracks in this
    /// batch; a track that would overwrite one of them fails instead.
    fn finish_track(
        &self,
        pending: Pending<'_>,
        inputs: &[&Path],
        written: &mut Vec<PathBuf>,
    ) -> Result<TrackReport, EditorError> {
        let m = &self.master;
        let Pending { index, set, settings, channels, sample_rate } = pending;
        let source = &set.file.path;

        let resampled = resample::resample_channels(&channels, sample_rate, m.sample_rate as f64);
        drop(channels);
        let batches = apply_layout(resampled, m.layout);

        let output = self.output_path(set, settings);
        if let Some(input) = inputs.iter().find(|input| same_file(&output, input)) {
            return Err(EditorError::OutputMatchesInput(input.to_path_buf()).at(source, RenderStage::Write));
        }
        if written.iter().any(|earlier| same_file(earlier, &output)) {
            return Err(EditorError::OutputCollision(output).at(source, RenderStage::Write));
        }

        let spec = WavSpec {
            format: m.format,
            channels: m.layout.channels(),
            sample_rate: m.sample_rate,
            bits_per_sample: m.bits_per_sample,
        };
        let mut container = WavContainer::new(spec);
        for (id, text) in [
            (INFO_TITLE, settings.title.as_str()),
            (INFO_ARTIST, settings.artist.as_str()),
            (INFO_PRODUCT, settings.album.as_str()),
            (INFO_CREATION_DATE, settings.year.as_str()),
            (INFO_COMMENT, settings.comment.as_str()),
        ] {
            if !text.is_empty() {
                container.set_info_text(id, text);
            }
        }
        container.set_info_text(INFO_TRACK, &(index + 1).to_string());

        let options = SaveOptions {
            format: m.format,
            bits_per_sample: m.bits_per_sample,
            sample_rate: Some(m.sample_rate),
            dither: m.dither,
            dither_seed: m.noise_seed.map(|s| s.wrapping_add(index as u64)),
        };
        container.save(&output, &batches, &options).map_err(|e| EditorError::from(e).at(source, RenderStage::Write))?;
        written.push(resolve(&output));

        let frames = batches.first().map_or(0, Vec::len);
        let peak = batches.iter().flatten().fold(0.0f64, |p, s| p.max(s.abs()));
        log::info!("{} -> {} ({} frames)", source.display(), output.display(), frames);
        Ok(TrackReport {
            index,
            set_id: set.id,
            source: source.clone(),
            output: Some(output),
            duration_secs: frames as f64 / m.sample_rate as f64,
            peak,
            error: None,
            stage: None,
        })
    }

    /// `<folder>/<prefix><title or stem><postfix>.wav`, numbered if configured.
    fn output_path(&self, set: &WavFileSet, settings: &PerFileOutputSettings) -> PathBuf {
        let stem = format!("{}{}{}", settings.prefix, display_title(set, settings), settings.postfix);
        let stem = sanitize(&stem);
        let path = self.master.folder.join(format!("{}.wav", stem));
        if !self.master.numbered || !path.exists() {
            return path;
        }
        (1u32..)
            .map(|n| self.master.folder.join(format!("{} ({}).wav", stem, n)))
            .find(|p| !p.exists())
            .unwrap_or(path)
    }

    fn failure(&self, index: usize, set: &WavFileSet, error: EditorError) -> TrackReport {
        log::warn!("track {} failed: {}", index + 1, error);
        let stage = match &error {
            EditorError::RenderFailed { stage, .. } => Some(*stage),
            _ => None,
        };
        TrackReport {
            index,
            set_id: set.id,
            source: set.file.path.clone(),
            output: None,
            duration_secs: 0.0,
            peak: 0.0,
            error: Some(error.to_string()),
            stage,
        }
    }

    fn notify_finished(&self, report: &TrackReport) {
        if let Some(ref observer) = self.observer {
            observer.on_track_finished(report);
        }
    }

    /// Track list and JSON report. Failures here are logged, not fatal.
    fn write_sidecars(&self, editor: &WavEditor, files: &[PerFileOutputSettings], report: &RenderReport) {
        let m = &self.master;
        if !m.write_track_list && !m.write_report {
            return;
        }
        if let Err(e) = fs::create_dir_all(&m.folder) {
            log::error!("failed to create {}: {}", m.folder.display(), e);
            return;
        }
        if m.write_track_list {
            let titles: Vec<String> = editor.iter().zip(files).map(|(set, s)| display_title(set, s)).collect();
            if let Err(e) = report::write_track_list(report, &titles, &m.folder) {
                log::error!("{}", e);
            }
        }
        if m.write_report {
            if let Err(e) = report::write_report(report, &m.folder) {
                log::error!("{}", e);
            }
        }
    }
}

/// The configured title, or the source file's stem.
fn display_title(set: &WavFileSet, settings: &PerFileOutputSettings) -> String {
    if !settings.title.is_empty() {
        return settings.title.clone();
    }
    set.file.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control() { '_' } else { c })
        .collect()
}

/// Mono downmix, or stereo with mono sources duplicated.
fn apply_layout(channels: Vec<Vec<f64>>, layout: ChannelLayout) -> Vec<Vec<f64>> {
    let mono = |channels: Vec<Vec<f64>>| -> Vec<f64> {
        if channels.len() == 1 {
            return channels.into_iter().next().unwrap_or_default();
        }
        let len = channels.first().map_or(0, Vec::len);
        let interleaved: Vec<f64> = (0..len).flat_map(|i| channels.iter().map(move |ch| ch[i])).collect();
        downmix_to_mono(&interleaved, channels.len())
    };
    match layout {
        ChannelLayout::Mono => vec![mono(channels)],
        ChannelLayout::Stereo if channels.len() == 2 => channels,
        ChannelLayout::Stereo => {
            let m = mono(channels);
            vec![m.clone(), m]
        }
    }
}

/// Whether two paths name the same file, resolving what exists on disk.
fn same_file(a: &Path, b: &Path) -> bool {
    resolve(a) == resolve(b)
}

fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            fs::canonicalize(parent).map(|p| p.join(name)).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
