use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::extraction::{
    correct_ocr_name, extract_candidate_name, load_image, CorrectedName, LoadedImage,
    MedicineVisionRecognizer, OcrEngine, TesseractCli, VisionNameEngine,
};
use super::labels::{DrugRecord, LabelLookup, LookupError, OpenFdaClient};
use super::reconcile::{reconcile, FinalName, VisionOutcome};
use super::vision::GeminiClient;
use super::PipelineError;
use crate::config::AppConfig;

/// What the label lookup produced for this scan.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(DrugRecord),
    Failed(LookupError),
    /// No name was recognized, so nothing was looked up.
    Skipped,
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&DrugRecord> {
        match self {
            Self::Found(record) => Some(record),
            _ => None,
        }
    }
}

/// Everything one scan produced, in pipeline order.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub image_path: PathBuf,
    pub ocr_text: String,
    /// Set when the OCR engine itself failed (the text is then empty).
    pub ocr_failure: Option<String>,
    pub ocr_name: Option<CorrectedName>,
    pub vision: VisionOutcome,
    pub final_name: Option<FinalName>,
    pub lookup: LookupOutcome,
}

/// Progress notifications, emitted in pipeline order.
#[derive(Debug)]
pub enum ScanEvent<'a> {
    OcrStarted,
    OcrFinished {
        raw_text: &'a str,
        name: Option<&'a CorrectedName>,
        /// Engine error, when the empty text comes from a failed OCR run.
        failure: Option<&'a str>,
    },
    VisionStarted,
    VisionFinished(&'a VisionOutcome),
    NameChosen(Option<&'a FinalName>),
    LookupStarted(&'a str),
}

/// Straight-line scan: Load → OCR → Extract → Correct → Vision → Reconcile → Lookup.
///
/// Uses trait objects for every external engine, enabling dependency injection.
pub struct ScanPipeline {
    ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    vision: Option<Box<dyn VisionNameEngine + Send + Sync>>,
    label_lookup: Box<dyn LabelLookup + Send + Sync>,
}

impl ScanPipeline {
    pub fn new(
        ocr_engine: Box<dyn OcrEngine + Send + Sync>,
        vision: Option<Box<dyn VisionNameEngine + Send + Sync>>,
        label_lookup: Box<dyn LabelLookup + Send + Sync>,
    ) -> Self {
        Self {
            ocr_engine,
            vision,
            label_lookup,
        }
    }

    /// Production wiring. `ocr_only` leaves the vision model out entirely.
    pub fn from_config(config: &AppConfig, ocr_only: bool) -> Result<Self, PipelineError> {
        let ocr_engine = build_ocr_engine(config);

        let vision: Option<Box<dyn VisionNameEngine + Send + Sync>> = if ocr_only {
            None
        } else {
            let client = GeminiClient::new(
                &config.gemini_base_url,
                config.gemini_api_key.clone(),
                config.http_timeout_secs,
            )
            .map_err(|e| PipelineError::ClientInit(e.to_string()))?;
            Some(Box::new(MedicineVisionRecognizer::new(
                Box::new(client),
                &config.gemini_model,
            )))
        };

        let label_lookup = OpenFdaClient::new(&config.openfda_base_url, config.http_timeout_secs)
            .map_err(|e| PipelineError::ClientInit(e.to_string()))?;

        Ok(Self::new(ocr_engine, vision, Box::new(label_lookup)))
    }

    pub fn scan(&self, path: &Path) -> Result<ScanReport, PipelineError> {
        self.scan_with(path, |_| {})
    }

    /// Run one scan, reporting progress through `on_event`.
    ///
    /// Only a missing or unloadable image is an error; every later failure is
    /// recorded in the report and the scan runs to completion.
    pub fn scan_with<F>(&self, path: &Path, mut on_event: F) -> Result<ScanReport, PipelineError>
    where
        F: FnMut(&ScanEvent<'_>),
    {
        let scan_id = Uuid::new_v4();
        let _span = tracing::info_span!("scan", scan_id = %scan_id).entered();

        let image = load_image(path)?;
        tracing::info!(
            path = %path.display(),
            format = image.format.mime_type(),
            "Starting medicine scan"
        );

        // Step 1: local OCR
        on_event(&ScanEvent::OcrStarted);
        let (ocr_text, ocr_failure) = self.run_ocr(&image);
        let ocr_name = extract_candidate_name(&ocr_text).map(|name| correct_ocr_name(&name));
        on_event(&ScanEvent::OcrFinished {
            raw_text: &ocr_text,
            name: ocr_name.as_ref(),
            failure: ocr_failure.as_deref(),
        });

        // Step 2: vision model
        let vision = match self.vision {
            Some(ref engine) => {
                on_event(&ScanEvent::VisionStarted);
                run_vision(engine.as_ref(), &image)
            }
            None => VisionOutcome::Skipped,
        };
        on_event(&ScanEvent::VisionFinished(&vision));

        // Step 3: reconcile
        let final_name = reconcile(&vision, ocr_name.as_ref().map(|n| &n.corrected));
        on_event(&ScanEvent::NameChosen(final_name.as_ref()));

        // Step 4: label lookup
        let lookup = match final_name {
            Some(ref chosen) => {
                on_event(&ScanEvent::LookupStarted(chosen.name.as_str()));
                match self.label_lookup.lookup(chosen.name.as_str()) {
                    Ok(record) => LookupOutcome::Found(record),
                    Err(err) => {
                        tracing::warn!(kind = err.kind(), error = %err, "Label lookup failed");
                        LookupOutcome::Failed(err)
                    }
                }
            }
            None => LookupOutcome::Skipped,
        };

        Ok(ScanReport {
            scan_id,
            image_path: image.path.clone(),
            ocr_text,
            ocr_failure,
            ocr_name,
            vision,
            final_name,
            lookup,
        })
    }

    /// OCR failure and "no text on the image" both end as empty text.
    fn run_ocr(&self, image: &LoadedImage) -> (String, Option<String>) {
        let start = std::time::Instant::now();
        match self.ocr_engine.ocr_image(&image.ocr_png) {
            Ok(page) => {
                tracing::info!(
                    elapsed_ms = %start.elapsed().as_millis(),
                    text_len = page.text.len(),
                    confidence = ?page.confidence,
                    "OCR complete"
                );
                (page.text, None)
            }
            Err(err) => {
                tracing::warn!(kind = err.kind(), error = %err, "OCR failed, continuing with empty text");
                (String::new(), Some(err.to_string()))
            }
        }
    }
}

fn run_vision(engine: &(dyn VisionNameEngine + Send + Sync), image: &LoadedImage) -> VisionOutcome {
    match engine.recognize_name(image) {
        Ok(result) => match result.name {
            Some(name) => VisionOutcome::Recognized(name),
            None => {
                tracing::info!(reply = %result.raw_reply.trim(), "Vision model could not name the medicine");
                VisionOutcome::Unreadable
            }
        },
        Err(err) => {
            tracing::warn!(kind = err.kind(), error = %err, "Vision recognition failed");
            VisionOutcome::Failed(err)
        }
    }
}

#[cfg(feature = "ocr")]
fn build_ocr_engine(config: &AppConfig) -> Box<dyn OcrEngine + Send + Sync> {
    use super::extraction::BundledTesseract;

    if let Some(ref dir) = config.tessdata_dir {
        match BundledTesseract::new(dir, &config.ocr_lang) {
            Ok(engine) => return Box::new(engine),
            Err(e) => tracing::warn!(error = %e, "Bundled Tesseract unavailable, using CLI"),
        }
    }
    Box::new(cli_engine(config))
}

#[cfg(not(feature = "ocr"))]
fn build_ocr_engine(config: &AppConfig) -> Box<dyn OcrEngine + Send + Sync> {
    Box::new(cli_engine(config))
}

fn cli_engine(config: &AppConfig) -> TesseractCli {
    let engine = TesseractCli::new(&config.tesseract_cmd, &config.ocr_lang);
    match config.tessdata_dir {
        Some(ref dir) => engine.with_tessdata_dir(dir),
        None => engine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{MockOcrEngine, MockVisionRecognizer, NameSource};
    use crate::pipeline::labels::MockLabelLookup;
    use crate::pipeline::vision::VisionError;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Write;
    use std::sync::Arc;

    fn strip_photo() -> tempfile::NamedTempFile {
        let img = RgbImage::from_fn(48, 32, |x, y| {
            Rgb([(x * 5 % 256) as u8, (y * 11 % 256) as u8, ((x * y) % 256) as u8])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();
        file.flush().unwrap();
        file
    }

    fn metformin_record() -> DrugRecord {
        DrugRecord {
            uses: Some("Type 2 diabetes.".into()),
            dosage: Some("500 mg twice daily.".into()),
            side_effects: Some("Nausea.".into()),
        }
    }

    struct Harness {
        ocr: Arc<MockOcrEngine>,
        vision: Arc<MockVisionRecognizer>,
        lookup: Arc<MockLabelLookup>,
    }

    impl Harness {
        fn new(ocr: MockOcrEngine, vision: MockVisionRecognizer, lookup: MockLabelLookup) -> Self {
            Self {
                ocr: Arc::new(ocr),
                vision: Arc::new(vision),
                lookup: Arc::new(lookup),
            }
        }

        fn pipeline(&self) -> ScanPipeline {
            ScanPipeline::new(
                Box::new(Arc::clone(&self.ocr)),
                Some(Box::new(Arc::clone(&self.vision))),
                Box::new(Arc::clone(&self.lookup)),
            )
        }
    }

    #[test]
    fn vision_name_drives_lookup() {
        let h = Harness::new(
            MockOcrEngine::new("lisipreari 500mg tablet", 0.7),
            MockVisionRecognizer::new("Metformin"),
            MockLabelLookup::new(metformin_record()),
        );
        let photo = strip_photo();

        let report = h.pipeline().scan(photo.path()).unwrap();

        let ocr_name = report.ocr_name.as_ref().unwrap();
        assert_eq!(ocr_name.original.as_str(), "lisipreari");
        assert_eq!(ocr_name.corrected.as_str(), "lisinopril");
        assert_eq!(report.vision.name().unwrap().as_str(), "metformin");

        let chosen = report.final_name.as_ref().unwrap();
        assert_eq!(chosen.name.as_str(), "metformin");
        assert_eq!(chosen.source, NameSource::VisionModel);
        assert_eq!(report.lookup, LookupOutcome::Found(metformin_record()));
        assert_eq!(h.lookup.call_count(), 1);
    }

    #[test]
    fn vision_failure_falls_back_to_corrected_ocr() {
        let h = Harness::new(
            MockOcrEngine::new("lisipreari 500mg tablet", 0.7),
            MockVisionRecognizer::failing(VisionError::Quota("exhausted".into())),
            MockLabelLookup::new(DrugRecord::default()),
        );
        let photo = strip_photo();

        let report = h.pipeline().scan(photo.path()).unwrap();

        assert!(matches!(report.vision, VisionOutcome::Failed(VisionError::Quota(_))));
        let chosen = report.final_name.unwrap();
        assert_eq!(chosen.name.as_str(), "lisinopril");
        assert_eq!(chosen.source, NameSource::LocalOcr);
    }

    #[test]
    fn ocr_failure_is_not_fatal() {
        let h = Harness::new(
            MockOcrEngine::failing("tesseract missing"),
            MockVisionRecognizer::new("Paracetamol"),
            MockLabelLookup::new(DrugRecord::default()),
        );
        let photo = strip_photo();

        let report = h.pipeline().scan(photo.path()).unwrap();

        assert!(report.ocr_text.is_empty());
        assert!(report.ocr_failure.unwrap().contains("tesseract missing"));
        assert!(report.ocr_name.is_none());
        assert_eq!(report.final_name.unwrap().name.as_str(), "paracetamol");
    }

    #[test]
    fn ocr_failure_reaches_progress_event() {
        let h = Harness::new(
            MockOcrEngine::failing("tesseract missing"),
            MockVisionRecognizer::new("Paracetamol"),
            MockLabelLookup::new(DrugRecord::default()),
        );
        let photo = strip_photo();
        let mut reported = None;

        h.pipeline()
            .scan_with(photo.path(), |event| {
                if let ScanEvent::OcrFinished { failure, .. } = event {
                    reported = failure.map(str::to_string);
                }
            })
            .unwrap();

        assert!(reported.unwrap().contains("tesseract missing"));
    }

    #[test]
    fn no_name_anywhere_skips_lookup() {
        let h = Harness::new(
            MockOcrEngine::new("rx 10 mg", 0.4),
            MockVisionRecognizer::new("unknown"),
            MockLabelLookup::new(metformin_record()),
        );
        let photo = strip_photo();

        let report = h.pipeline().scan(photo.path()).unwrap();

        assert_eq!(report.vision, VisionOutcome::Unreadable);
        assert!(report.final_name.is_none());
        assert_eq!(report.lookup, LookupOutcome::Skipped);
        assert_eq!(h.lookup.call_count(), 0);
    }

    #[test]
    fn lookup_failure_is_recorded() {
        let h = Harness::new(
            MockOcrEngine::new("", 0.0),
            MockVisionRecognizer::new("Zzzmedicine"),
            MockLabelLookup::failing(LookupError::NotFound("zzzmedicine".into())),
        );
        let photo = strip_photo();

        let report = h.pipeline().scan(photo.path()).unwrap();

        assert_eq!(
            report.lookup,
            LookupOutcome::Failed(LookupError::NotFound("zzzmedicine".into()))
        );
        assert!(report.lookup.record().is_none());
    }

    #[test]
    fn missing_file_halts_before_any_engine() {
        let h = Harness::new(
            MockOcrEngine::new("metformin", 0.9),
            MockVisionRecognizer::new("Metformin"),
            MockLabelLookup::new(metformin_record()),
        );
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-strip.jpg");

        let err = h.pipeline().scan(&missing).unwrap_err();

        assert!(matches!(err, PipelineError::FileNotFound(ref p) if p == &missing));
        assert_eq!(h.ocr.call_count(), 0);
        assert_eq!(h.vision.call_count(), 0);
        assert_eq!(h.lookup.call_count(), 0);
    }

    #[test]
    fn ocr_only_pipeline_never_calls_vision() {
        let lookup = Arc::new(MockLabelLookup::new(DrugRecord::default()));
        let pipeline = ScanPipeline::new(
            Box::new(MockOcrEngine::new("metformine 850", 0.8)),
            None,
            Box::new(Arc::clone(&lookup)),
        );
        let photo = strip_photo();

        let report = pipeline.scan(photo.path()).unwrap();

        assert_eq!(report.vision, VisionOutcome::Skipped);
        assert_eq!(report.final_name.unwrap().name.as_str(), "metformin");
        assert_eq!(lookup.call_count(), 1);
    }

    #[test]
    fn events_arrive_in_pipeline_order() {
        let h = Harness::new(
            MockOcrEngine::new("amoxilin 250", 0.8),
            MockVisionRecognizer::new("Amoxicillin"),
            MockLabelLookup::new(DrugRecord::default()),
        );
        let photo = strip_photo();
        let mut seen = Vec::new();

        h.pipeline()
            .scan_with(photo.path(), |event| {
                seen.push(match event {
                    ScanEvent::OcrStarted => "ocr_started",
                    ScanEvent::OcrFinished { .. } => "ocr_finished",
                    ScanEvent::VisionStarted => "vision_started",
                    ScanEvent::VisionFinished(_) => "vision_finished",
                    ScanEvent::NameChosen(_) => "name_chosen",
                    ScanEvent::LookupStarted(_) => "lookup_started",
                })
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                "ocr_started",
                "ocr_finished",
                "vision_started",
                "vision_finished",
                "name_chosen",
                "lookup_started"
            ]
        );
    }
}
