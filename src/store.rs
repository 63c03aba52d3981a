use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{AppError, AppResult};
use crate::models::StudentRecord;

/// Columns an uploaded file must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Name",
    "Internal_Assessment_1",
    "Internal_Assessment_2",
    "Attendance_Percentage",
    "Previous_Semester_Grade",
    "Participation_Score",
];

pub const STUDENT_ID_COLUMN: &str = "Student_ID";

const EXPORT_COLUMNS: [&str; 7] = [
    "Name",
    STUDENT_ID_COLUMN,
    "Internal_Assessment_1",
    "Internal_Assessment_2",
    "Attendance_Percentage",
    "Previous_Semester_Grade",
    "Participation_Score",
];

/// Which columns a dataset file has to provide. `Student_ID` is read for
/// `student_info.id` but is only enforced when asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadPolicy {
    pub require_student_id: bool,
}

impl UploadPolicy {
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut columns = REQUIRED_COLUMNS.to_vec();
        if self.require_student_id {
            columns.push(STUDENT_ID_COLUMN);
        }
        columns
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<StudentRecord>,
}

impl Dataset {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        Self { records }
    }

    /// Reads the dataset a process starts from.
    pub fn load(path: &Path, policy: UploadPolicy) -> AppResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| AppError::data_load(path, e))?;
        Self::from_reader(file, policy).map_err(|e| AppError::data_load(path, e))
    }

    /// Parses CSV content, checking the header row before any record.
    pub fn from_reader<R: Read>(reader: R, policy: UploadPolicy) -> AppResult<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|e| AppError::InvalidUpload(format!("unreadable CSV header: {e}")))?
            .clone();

        let missing: Vec<String> = policy
            .required_columns()
            .into_iter()
            .filter(|column| !headers.iter().any(|header| header == *column))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Schema { missing });
        }

        let mut records = Vec::new();
        for (line, result) in reader.deserialize::<StudentRecord>().enumerate() {
            let record = result.map_err(|e| {
                AppError::InvalidUpload(format!("malformed CSV row {}: {e}", line + 1))
            })?;
            records.push(record);
        }

        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive exact match; the first matching row wins.
    pub fn find_by_name(&self, name: &str) -> Option<&StudentRecord> {
        let wanted = name.to_lowercase();
        self.records
            .iter()
            .find(|record| record.name.to_lowercase() == wanted)
    }

    /// Writes the dataset to `path`, replacing whatever is there.
    pub fn write_csv(&self, path: &Path) -> AppResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| AppError::persist(path, e))?;
        writer
            .write_record(EXPORT_COLUMNS)
            .map_err(|e| AppError::persist(path, e))?;
        for record in &self.records {
            writer
                .serialize(record)
                .map_err(|e| AppError::persist(path, e))?;
        }
        writer.flush().map_err(|e| AppError::persist(path, e))?;
        Ok(())
    }
}

/// Shared holder of the current dataset. Readers take an `Arc` snapshot
/// and never see a half-replaced dataset. Lookups go through the snapshot
/// so one request never mixes two datasets.
#[derive(Debug, Default)]
pub struct DatasetStore {
    current: RwLock<Arc<Dataset>>,
    writer: Mutex<()>,
}

impl DatasetStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
            writer: Mutex::new(()),
        }
    }

    pub fn all(&self) -> Arc<Dataset> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, dataset: Dataset) {
        let next = Arc::new(dataset);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Persists `dataset` and then swaps it in, one writer at a time, so the
    /// exported file always matches the dataset being served. Nothing is
    /// swapped if `persist` fails.
    pub fn replace_with<F>(&self, dataset: Dataset, persist: F) -> AppResult<()>
    where
        F: FnOnce(&Dataset) -> AppResult<()>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        persist(&dataset)?;
        self.replace(dataset);
        Ok(())
    }
}
