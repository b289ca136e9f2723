//! Event file readers.
//!
//! CSV and Parquet tables are read by column name behind the async
//! [`EventReader`] trait. [`EventLoader`] picks the reader from the file
//! extension and turns the selected columns into an [`EventTable`].

use std::fs;
use std::path::{Path, PathBuf};

use arrow::array::{Array, Float64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use et_types::{internal_error, DataError, EventClass, EventTable, TuneError, TuneResult};
use ndarray::{Array1, Array2};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

/// Named numeric columns read from a tabular file, all of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumns {
    pub names: Vec<String>,
    /// One vector per column, in the order of `names`.
    pub values: Vec<Vec<f64>>,
}

impl RawColumns {
    pub fn num_rows(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }
}

/// Supported on-disk table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Parquet,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> TuneResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(DataFormat::Csv),
            "parquet" | "pq" => Ok(DataFormat::Parquet),
            _ => Err(DataError::UnsupportedFormat { extension }.into()),
        }
    }
}

/// Reads selected numeric columns from a file.
#[async_trait]
pub trait EventReader: Send + Sync + std::fmt::Debug {
    async fn read(&self, path: &Path, columns: &[String]) -> TuneResult<RawColumns>;

    fn name(&self) -> &str;
}

/// CSV reader; the first row must name the columns.
#[derive(Debug, Clone, Default)]
pub struct CsvEventReader;

impl CsvEventReader {
    fn read_blocking(path: &Path, columns: &[String]) -> TuneResult<RawColumns> {
        use csv::ReaderBuilder;

        tracing::info!("Loading CSV events from: {}", path.display());

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to open CSV file {}: {}", path.display(), e),
            })?;

        let headers = rdr
            .headers()
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .clone();
        tracing::debug!("CSV headers: {:?}", headers);

        let indices = columns
            .iter()
            .map(|column| {
                headers
                    .iter()
                    .position(|h| h == column)
                    .ok_or_else(|| DataError::ColumnNotFound {
                        column: column.clone(),
                        source_name: path.display().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = vec![Vec::new(); columns.len()];
        for (line_num, result) in rdr.records().enumerate() {
            // header is line 1
            let line = line_num + 2;
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV record at line {}: {}", line, e),
            })?;

            for (slot, &idx) in indices.iter().enumerate() {
                let field = record.get(idx).unwrap_or("");
                let value = if field.is_empty() {
                    f64::NAN
                } else {
                    field.parse::<f64>().map_err(|e| DataError::ParseError {
                        message: format!(
                            "Could not parse {} value '{}' at line {}: {}",
                            columns[slot], field, line, e
                        ),
                    })?
                };
                values[slot].push(value);
            }
        }

        Ok(RawColumns {
            names: columns.to_vec(),
            values,
        })
    }
}

#[async_trait]
impl EventReader for CsvEventReader {
    async fn read(&self, path: &Path, columns: &[String]) -> TuneResult<RawColumns> {
        let path = path.to_path_buf();
        let columns = columns.to_vec();
        tokio::task::spawn_blocking(move || Self::read_blocking(&path, &columns))
            .await
            .map_err(|e| internal_error!("CSV reader task failed: {}", e))?
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Parquet reader; any numeric column type is cast to f64.
#[derive(Debug, Clone, Default)]
pub struct ParquetEventReader;

impl ParquetEventReader {
    fn read_blocking(path: &Path, columns: &[String]) -> TuneResult<RawColumns> {
        tracing::info!("Loading Parquet events from: {}", path.display());

        let file = fs::File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            DataError::LoadingFailed {
                message: format!("Failed to create Parquet reader for {}: {}", path.display(), e),
            }
        })?;

        let schema = builder.schema().clone();
        for column in columns {
            if schema.index_of(column).is_err() {
                return Err(DataError::ColumnNotFound {
                    column: column.clone(),
                    source_name: path.display().to_string(),
                }
                .into());
            }
        }

        let reader = builder
            .build()
            .map_err(|e| TuneError::Parquet(format!("Failed to build reader: {}", e)))?;

        let mut values = vec![Vec::new(); columns.len()];
        for batch_result in reader {
            let batch = batch_result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read Parquet batch: {}", e),
            })?;
            Self::append_batch(&batch, columns, &mut values)?;
        }

        Ok(RawColumns {
            names: columns.to_vec(),
            values,
        })
    }

    fn append_batch(
        batch: &RecordBatch,
        columns: &[String],
        values: &mut [Vec<f64>],
    ) -> TuneResult<()> {
        for (slot, column) in columns.iter().enumerate() {
            let array = batch.column_by_name(column).ok_or_else(|| DataError::ColumnNotFound {
                column: column.clone(),
                source_name: "parquet batch".to_string(),
            })?;
            let cast = arrow::compute::cast(array, &DataType::Float64)
                .map_err(|e| TuneError::Arrow(format!("column {}: {}", column, e)))?;
            let floats = cast
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| DataError::InvalidFormat {
                    message: format!("column {} is not numeric", column),
                })?;

            values[slot].extend((0..floats.len()).map(|i| {
                if floats.is_null(i) {
                    f64::NAN
                } else {
                    floats.value(i)
                }
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl EventReader for ParquetEventReader {
    async fn read(&self, path: &Path, columns: &[String]) -> TuneResult<RawColumns> {
        let path = path.to_path_buf();
        let columns = columns.to_vec();
        tokio::task::spawn_blocking(move || Self::read_blocking(&path, &columns))
            .await
            .map_err(|e| internal_error!("Parquet reader task failed: {}", e))?
    }

    fn name(&self) -> &str {
        "parquet"
    }
}

/// Loads one class of events: engineered features plus the per-event weight.
#[derive(Debug, Clone)]
pub struct EventLoader {
    features: Vec<String>,
    weight_column: String,
}

impl EventLoader {
    pub fn new(features: Vec<String>, weight_column: impl Into<String>) -> Self {
        Self {
            features,
            weight_column: weight_column.into(),
        }
    }

    fn reader_for(format: DataFormat) -> Box<dyn EventReader> {
        match format {
            DataFormat::Csv => Box::new(CsvEventReader),
            DataFormat::Parquet => Box::new(ParquetEventReader),
        }
    }

    pub async fn load<P: AsRef<Path>>(&self, path: P, class: EventClass) -> TuneResult<EventTable> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DataError::SourceNotFound(path.display().to_string()).into());
        }

        let reader = Self::reader_for(DataFormat::from_path(&path)?);
        let mut columns = self.features.clone();
        columns.push(self.weight_column.clone());

        let raw = reader.read(&path, &columns).await?;
        let table = self.to_table(raw, class)?;

        tracing::info!(
            "Loaded {} {} events ({} features) from {} via {} reader",
            table.len(),
            class,
            table.n_features(),
            path.display(),
            reader.name()
        );
        Ok(table)
    }

    /// Assemble an event table, dropping rows with any non-finite value.
    fn to_table(&self, raw: RawColumns, class: EventClass) -> TuneResult<EventTable> {
        let n_features = self.features.len();
        let rows = raw.num_rows();

        let mut flat = Vec::with_capacity(rows * n_features);
        let mut weights = Vec::with_capacity(rows);
        let mut skipped = 0usize;

        for row in 0..rows {
            let finite = raw.values.iter().all(|col| col[row].is_finite());
            if !finite {
                skipped += 1;
                continue;
            }
            flat.extend(raw.values[..n_features].iter().map(|col| col[row] as f32));
            weights.push(raw.values[n_features][row] as f32);
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} {} events with missing or non-finite values", skipped, class);
        }
        if weights.is_empty() {
            return Err(DataError::InsufficientData {
                message: format!("no usable {} events", class),
            }
            .into());
        }

        let kept = weights.len();
        let features = Array2::from_shape_vec((kept, n_features), flat).map_err(|e| {
            DataError::ShapeMismatch {
                message: e.to_string(),
            }
        })?;

        EventTable::with_class(self.features.clone(), features, Array1::from(weights), class)
    }
}
