//! Menu intake: turns text, spreadsheets, photos and dictation into dish drafts.
//!
//! Every entry point validates before anything is added to a session. The
//! caller only appends drafts on `Ok`, so a failed import leaves the existing
//! dish list untouched.

use crate::{
    config::settings::IntakeSettings,
    core::{
        audio::decode_wav,
        dish::{DishDraft, InlineImage},
    },
    errors::{Error, Result},
    genai::GenAiClient,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, instrument, warn};

const NAME_HEADERS: [&str; 10] = [
    "name", "nume", "denumire", "denuire", "dish", "item", "produs", "product", "title", "plat",
];
const DESCRIPTION_HEADERS: [&str; 5] = ["desc", "descriere", "ingredient", "detail", "compozitie"];

/// Extracts dishes from free-form menu text.
#[instrument(skip_all, fields(chars = text.len()))]
pub async fn parse_menu_text(genai: &dyn GenAiClient, text: &str) -> Result<Vec<DishDraft>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Intake {
            message: "The menu text is empty".to_string(),
        });
    }

    let drafts: Vec<DishDraft> = genai
        .extract_dishes(text)
        .await?
        .into_iter()
        .filter(|d| !d.name.trim().is_empty())
        .map(|d| DishDraft::new(d.name.trim(), d.description.trim()))
        .collect();

    if drafts.is_empty() {
        return Err(Error::NoDishesFound {
            origin: "menu text".to_string(),
        });
    }
    info!(dishes = drafts.len(), "Menu text parsed");
    Ok(drafts)
}

fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .filter(|d| first_line.as_bytes().contains(d))
        .unwrap_or(b',')
}

fn find_column(headers: &StringRecord, patterns: &[&str], skip: Option<usize>) -> Option<usize> {
    headers.iter().enumerate().position(|(i, h)| {
        let h = h.to_lowercase();
        Some(i) != skip && patterns.iter().any(|p| h.contains(p))
    })
}

/// Name and description columns of a header row.
///
/// Description headers are matched first: Romanian headers such as
/// `Descriere produs` also contain a name keyword.
fn header_columns(headers: &StringRecord) -> Option<(usize, Option<usize>)> {
    let desc_col = find_column(headers, &DESCRIPTION_HEADERS, None);
    let name_col = find_column(headers, &NAME_HEADERS, desc_col)?;
    Some((name_col, desc_col))
}

fn cell(record: &StringRecord, index: usize) -> &str {
    record.get(index).map_or("", str::trim)
}

/// Imports dishes from a CSV spreadsheet.
///
/// A header row is recognised by name / description keywords (English and
/// Romanian, including the common `Denuire` misspelling). Without a usable
/// header, each row's first two non-empty cells are read as name and
/// description.
pub fn import_spreadsheet(bytes: &[u8]) -> Result<Vec<DishDraft>> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(text);

    let records: Vec<StringRecord> = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes())
        .records()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Intake {
            message: format!("Could not read the spreadsheet: {e}"),
        })?;

    let records: Vec<StringRecord> = records
        .into_iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
        .collect();

    // a recognised header row is never read as a dish
    let mut body: &[StringRecord] = &records;
    if let Some((headers, rows)) = records.split_first()
        && let Some((name_col, desc_col)) = header_columns(headers)
    {
        let drafts: Vec<DishDraft> = rows
            .iter()
            .filter(|row| !cell(row, name_col).is_empty())
            .map(|row| {
                DishDraft::new(
                    cell(row, name_col),
                    desc_col.map_or("", |c| cell(row, c)),
                )
            })
            .collect();
        if !drafts.is_empty() {
            info!(dishes = drafts.len(), "Spreadsheet imported by header");
            return Ok(drafts);
        }
        warn!("Spreadsheet header matched but no rows had a name, trying positional columns");
        body = rows;
    }

    let drafts: Vec<DishDraft> = body
        .iter()
        .filter_map(|row| {
            let mut cells = row.iter().map(str::trim).filter(|c| !c.is_empty());
            let name = cells.next()?;
            Some(DishDraft::new(name, cells.next().unwrap_or("")))
        })
        .collect();

    if drafts.is_empty() {
        return Err(Error::NoDishesFound {
            origin: "spreadsheet".to_string(),
        });
    }
    info!(dishes = drafts.len(), "Spreadsheet imported by position");
    Ok(drafts)
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// Original filename
    pub filename: String,
    /// Declared MIME type, if any
    pub content_type: Option<String>,
    /// File contents
    pub data: Vec<u8>,
}

impl PhotoUpload {
    fn mime_type(&self) -> Option<String> {
        if let Some(ct) = &self.content_type
            && ct.starts_with("image/")
        {
            return Some(ct.clone());
        }
        let ext = self.filename.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some("image/png".to_string()),
            "jpg" | "jpeg" => Some("image/jpeg".to_string()),
            "webp" => Some("image/webp".to_string()),
            "gif" => Some("image/gif".to_string()),
            "heic" => Some("image/heic".to_string()),
            _ => None,
        }
    }

    /// Validates the upload as an image within the size limit.
    pub fn to_image(&self, limits: &IntakeSettings) -> Result<InlineImage> {
        let Some(mime_type) = self.mime_type() else {
            return Err(Error::Intake {
                message: format!("{} is not an image", self.filename),
            });
        };
        if self.data.len() > limits.max_photo_bytes {
            return Err(Error::Intake {
                message: format!(
                    "{} is larger than {} MB",
                    self.filename,
                    limits.max_photo_bytes / (1024 * 1024)
                ),
            });
        }
        Ok(InlineImage::new(mime_type, self.data.clone()))
    }
}

/// Dish name derived from a filename: extension dropped, `_`/`-` read as spaces.
#[must_use]
pub fn dish_name_from_filename(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map_or(filename, |(stem, _)| stem);
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of a bulk photo upload
#[derive(Debug, Default)]
pub struct BulkIntake {
    /// One draft per accepted photo
    pub drafts: Vec<DishDraft>,
    /// Why files were skipped
    pub warnings: Vec<String>,
}

/// Turns each uploaded photo into a draft carrying it as reference.
pub fn import_bulk_photos(uploads: &[PhotoUpload], limits: &IntakeSettings) -> BulkIntake {
    let mut intake = BulkIntake::default();

    if uploads.len() > limits.max_bulk_photos {
        let extra = uploads.len() - limits.max_bulk_photos;
        warn!(extra, "Bulk upload over the photo limit");
        intake.warnings.push(format!(
            "Only the first {} photos were processed, {extra} ignored",
            limits.max_bulk_photos
        ));
    }

    for upload in uploads.iter().take(limits.max_bulk_photos) {
        match upload.to_image(limits) {
            Ok(image) => {
                let name = dish_name_from_filename(&upload.filename);
                let name = if name.is_empty() {
                    format!("Dish {}", intake.drafts.len() + 1)
                } else {
                    name
                };
                intake.drafts.push(DishDraft {
                    name,
                    description: String::new(),
                    reference_image: Some(image),
                    reference_locked: false,
                });
            }
            Err(e) => {
                warn!(file = %upload.filename, "Skipped photo: {e}");
                intake.warnings.push(e.to_string());
            }
        }
    }

    intake
}

/// One draft from a reference photo, locked to reproduce its plating.
pub fn reference_photo_draft(
    name: &str,
    description: &str,
    upload: &PhotoUpload,
    limits: &IntakeSettings,
) -> Result<DishDraft> {
    let image = upload.to_image(limits)?;
    let name = if name.trim().is_empty() {
        dish_name_from_filename(&upload.filename)
    } else {
        name.trim().to_string()
    };
    if name.is_empty() {
        return Err(Error::Intake {
            message: "Give the dish a name".to_string(),
        });
    }
    Ok(DishDraft {
        name,
        description: description.trim().to_string(),
        reference_image: Some(image),
        reference_locked: true,
    })
}

/// Transcribes a dictated WAV recording.
///
/// The recording is checked locally first so a bad file never reaches the service.
pub async fn transcribe_recording(genai: &dyn GenAiClient, wav: &[u8]) -> Result<String> {
    let clip = decode_wav(wav)?;
    if clip.samples.is_empty() {
        return Err(Error::Intake {
            message: "The recording is empty".to_string(),
        });
    }
    let text = genai.transcribe_audio(wav).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Intake {
            message: "No speech was recognised in the recording".to_string(),
        });
    }
    info!(seconds = clip.duration().as_secs(), "Dictation transcribed");
    Ok(text.to_string())
}

/// Accumulates dictated menu text.
///
/// Interim transcripts replace each other and are only shown; finalized
/// transcripts are appended once.
#[derive(Debug, Default, Clone)]
pub struct DictationBuffer {
    committed: String,
    interim: String,
}

impl DictationBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current interim transcript.
    pub fn set_interim(&mut self, text: &str) {
        self.interim = text.trim().to_string();
    }

    /// Commits a final transcript and drops the interim one it supersedes.
    pub fn finalize(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            if !self.committed.is_empty() {
                self.committed.push('\n');
            }
            self.committed.push_str(text);
        }
        self.interim.clear();
    }

    /// Text that feeds menu parsing.
    #[must_use]
    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// Committed text followed by the interim transcript, for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        match (self.committed.is_empty(), self.interim.is_empty()) {
            (_, true) => self.committed.clone(),
            (true, false) => format!("{}…", self.interim),
            (false, false) => format!("{}\n{}…", self.committed, self.interim),
        }
    }

    /// Clears everything.
    pub fn clear(&mut self) {
        self.committed.clear();
        self.interim.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::audio::{Clip, encode_wav},
        test_utils::FakeGenAi,
    };

    fn photo(name: &str, bytes: usize) -> PhotoUpload {
        PhotoUpload {
            filename: name.to_string(),
            content_type: None,
            data: vec![0; bytes],
        }
    }

    #[tokio::test]
    async fn test_parse_menu_text() -> Result<()> {
        let genai = FakeGenAi::new();
        let drafts = parse_menu_text(
            &genai,
            "Pizza Diavola: spicy salami, mozzarella\nTiramisu: mascarpone",
        )
        .await?;
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "Pizza Diavola");
        assert_eq!(drafts[0].description, "spicy salami, mozzarella");
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_menu_text_rejects_blank_without_calling() -> Result<()> {
        let genai = FakeGenAi::new();
        assert!(matches!(
            parse_menu_text(&genai, "  \n ").await,
            Err(Error::Intake { .. })
        ));
        assert_eq!(genai.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_menu_text_nothing_found() -> Result<()> {
        let genai = FakeGenAi::new();
        assert!(matches!(
            parse_menu_text(&genai, "Open daily 12-22").await,
            Err(Error::NoDishesFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_menu_text_service_failure() -> Result<()> {
        let genai = FakeGenAi::failing();
        assert!(matches!(
            parse_menu_text(&genai, "Soup: hot").await,
            Err(Error::GenAi(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_transcribe_recording() -> Result<()> {
        let genai = FakeGenAi::new();
        let wav = encode_wav(&Clip::new(vec![10; 1_600], 16_000));
        let text = transcribe_recording(&genai, &wav).await?;
        assert!(text.starts_with("Dictated dish"));

        assert!(matches!(
            transcribe_recording(&genai, b"not audio").await,
            Err(Error::Audio { .. })
        ));
        let silent = encode_wav(&Clip::new(Vec::new(), 16_000));
        assert!(matches!(
            transcribe_recording(&genai, &silent).await,
            Err(Error::Intake { .. })
        ));
        assert_eq!(genai.calls(), 1);
        Ok(())
    }

    #[test]
    fn test_spreadsheet_with_headers() {
        let csv = "Name,Price,Description\nPizza Diavola,12,Spicy salami\n,5,orphan\nTiramisu,7,\n";
        let drafts = import_spreadsheet(csv.as_bytes()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "Pizza Diavola");
        assert_eq!(drafts[0].description, "Spicy salami");
        assert_eq!(drafts[1].description, "");
    }

    #[test]
    fn test_spreadsheet_misspelled_romanian_header() {
        let csv = "\u{feff}Denuire;Compozitie\nCiorbă de burtă;smântână, usturoi\n";
        let drafts = import_spreadsheet(csv.as_bytes()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Ciorbă de burtă");
        assert_eq!(drafts[0].description, "smântână, usturoi");
    }

    #[test]
    fn test_spreadsheet_positional_fallback() {
        let csv = "Margherita\ttomato and basil\n\tCarbonara\tguanciale\n";
        let drafts = import_spreadsheet(csv.as_bytes()).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "Margherita");
        assert_eq!(drafts[0].description, "tomato and basil");
        assert_eq!(drafts[1].name, "Carbonara");
        assert_eq!(drafts[1].description, "guanciale");
    }

    #[test]
    fn test_spreadsheet_header_only_has_no_dishes() {
        assert!(matches!(
            import_spreadsheet(b"Product name,ingredients\n"),
            Err(Error::NoDishesFound { .. })
        ));
    }

    #[test]
    fn test_spreadsheet_header_without_names_reads_rows_by_position() {
        // name column is empty, the header row itself is skipped
        let csv = "Name,Notes,Description\n,Lasagna,beef ragu\n";
        let drafts = import_spreadsheet(csv.as_bytes()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Lasagna");
        assert_eq!(drafts[0].description, "beef ragu");
    }

    #[test]
    fn test_spreadsheet_romanian_description_header_with_name_keyword() {
        let csv = "Denumire produs;Descriere produs;Pret\nSarmale;varză, carne de porc;35\n";
        let drafts = import_spreadsheet(csv.as_bytes()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Sarmale");
        assert_eq!(drafts[0].description, "varză, carne de porc");
    }

    #[test]
    fn test_spreadsheet_empty_is_error() {
        assert!(matches!(
            import_spreadsheet(b"\n ,, \n"),
            Err(Error::NoDishesFound { .. })
        ));
    }

    #[test]
    fn test_bulk_photos_caps_at_limit() {
        let limits = IntakeSettings::default();
        let uploads: Vec<PhotoUpload> = (1..=10)
            .map(|i| photo(&format!("dish_{i}.jpg"), 10))
            .collect();

        let intake = import_bulk_photos(&uploads, &limits);
        assert_eq!(intake.drafts.len(), 9);
        assert_eq!(intake.warnings.len(), 1);
        assert_eq!(intake.drafts[0].name, "dish 1");
        let reference = intake.drafts[0].reference_image.as_ref().unwrap();
        assert_eq!(reference.mime_type, "image/jpeg");
        assert!(!intake.drafts[0].reference_locked);
    }

    #[test]
    fn test_bulk_photos_skip_oversized_and_non_images() {
        let limits = IntakeSettings::default();
        let uploads = vec![
            photo("Beef-Wellington.png", 100),
            photo("huge.png", limits.max_photo_bytes + 1),
            photo("menu.pdf", 100),
        ];

        let intake = import_bulk_photos(&uploads, &limits);
        assert_eq!(intake.drafts.len(), 1);
        assert_eq!(intake.drafts[0].name, "Beef Wellington");
        assert_eq!(intake.warnings.len(), 2);
    }

    #[test]
    fn test_reference_photo_is_locked() {
        let limits = IntakeSettings::default();
        let draft =
            reference_photo_draft("", "our signature", &photo("duck_a_l_orange.webp", 10), &limits)
                .unwrap();
        assert!(draft.reference_locked);
        assert_eq!(draft.name, "duck a l orange");

        let too_big = photo("x.png", limits.max_photo_bytes + 1);
        assert!(reference_photo_draft("X", "", &too_big, &limits).is_err());
    }

    #[test]
    fn test_dictation_interim_never_double_counts() {
        let mut buffer = DictationBuffer::new();
        buffer.set_interim("pizza");
        buffer.set_interim("pizza diavola");
        assert_eq!(buffer.committed(), "");
        assert_eq!(buffer.display_text(), "pizza diavola…");

        buffer.finalize("Pizza Diavola: spicy salami");
        buffer.set_interim("tira");
        assert_eq!(buffer.committed(), "Pizza Diavola: spicy salami");

        buffer.finalize("Tiramisu");
        assert_eq!(buffer.committed(), "Pizza Diavola: spicy salami\nTiramisu");
        assert_eq!(buffer.display_text(), buffer.committed());
    }
}
