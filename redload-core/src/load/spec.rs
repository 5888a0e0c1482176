//! Declarative load requests.
//!
//! A [`LoadSpec`] is plain data (deserializable from a workflow's load step).
//! [`LoadSpec::validate`] checks every source/format/option combination so
//! that statement rendering never sees an invalid request.

use crate::aws::{KNOWN_REGIONS, S3Location};
use crate::validation::{validate_identifier, validate_table_name};
use crate::{Result, error::RedloadError};
use serde::{Deserialize, Serialize};

/// URI scheme naming a NoSQL source table.
pub const NOSQL_SCHEME: &str = "dynamodb://";

/// Default share of the table's provisioned read capacity used by a scan.
pub const DEFAULT_READ_RATIO: u32 = 50;

/// Where the load reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Every object under an object-storage key prefix
    ObjectStoragePrefix,
    /// Objects listed in a manifest document
    ObjectStorageManifest,
    /// A key-value table scan
    NoSqlTable,
}

impl SourceKind {
    /// True for both object-storage kinds.
    pub fn is_object_storage(self) -> bool {
        !matches!(self, Self::NoSqlTable)
    }
}

/// Source data format for object-storage loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// Delimited text
    Csv,
    /// Fixed-width columns, one row per line
    FixedWidth,
    /// JSON objects matched to columns by key
    Json,
    /// JSON objects mapped to columns through a path file
    JsonWithPathFile,
    /// Self-describing Avro
    Avro,
}

/// Delimited-text options. Unset fields keep the warehouse defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter (default `,`)
    pub delimiter: Option<char>,
    /// Quote character (default `"`)
    pub quote: Option<char>,
    /// Backslash-escaped input instead of quoted fields
    pub escape: bool,
    /// Header lines to skip
    pub ignore_header: Option<u32>,
    /// String loaded as NULL
    pub null_as: Option<String>,
    /// Load empty fields as NULL
    pub empty_as_null: bool,
    /// Load whitespace-only fields as NULL
    pub blanks_as_null: bool,
}

/// One fixed-width column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWidthColumn {
    /// Column label
    pub label: String,
    /// Width in characters
    pub width: u32,
}

impl FixedWidthColumn {
    /// Creates a column specification.
    pub fn new(label: impl Into<String>, width: u32) -> Self {
        Self {
            label: label.into(),
            width,
        }
    }
}

/// How the warehouse authorizes the source read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadAuthorization {
    /// Access key, secret key and optional session token from the secret
    /// lookup
    #[default]
    Secrets,
    /// A role the warehouse assumes
    IamRole {
        /// Role ARN
        arn: String,
    },
}

/// Compression of the source objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// gzip
    Gzip,
    /// bzip2
    Bzip2,
    /// lzop
    Lzop,
    /// zstd
    Zstd,
}

impl Compression {
    /// Statement keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Gzip => "GZIP",
            Self::Bzip2 => "BZIP2",
            Self::Lzop => "LZOP",
            Self::Zstd => "ZSTD",
        }
    }
}

/// Options shared by all loads. Only `region`, `read_ratio`, `comp_update`
/// and `stat_update` apply to NoSQL sources; `no_load` never does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Region of the source, when it differs from the warehouse's
    pub region: Option<String>,
    /// Source compression
    pub compression: Option<Compression>,
    /// Rows that may be rejected before the load fails
    pub max_error: Option<u32>,
    /// Timestamp format (`auto` or a pattern)
    pub time_format: Option<String>,
    /// Date format (`auto` or a pattern)
    pub date_format: Option<String>,
    /// Truncate over-long strings instead of rejecting the row
    pub truncate_columns: bool,
    /// Apply compression encodings automatically
    pub comp_update: Option<bool>,
    /// Refresh table statistics after the load
    pub stat_update: Option<bool>,
    /// Percent of provisioned read capacity (NoSQL only, 1..=200)
    pub read_ratio: Option<u32>,
    /// Check the source files without loading any rows (object storage only)
    pub no_load: bool,
}

/// A declarative bulk-load request.
///
/// # Example
/// ```rust
/// use redload_core::load::{CsvOptions, DataFormat, LoadSpec, SourceKind};
///
/// let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://fixtures/csv/", "dest")
///     .with_format(DataFormat::Csv)
///     .with_csv(CsvOptions { ignore_header: Some(1), ..CsvOptions::default() });
///
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSpec {
    /// Source kind
    pub source_kind: SourceKind,
    /// Prefix or manifest URI (`s3://`), or table URI (`dynamodb://`)
    pub source_location: String,
    /// Destination table, optionally `schema.table`
    pub destination_table: String,
    /// Data format; required for object storage, absent for NoSQL
    #[serde(default)]
    pub format: Option<DataFormat>,
    /// Delimited-text options (CSV only)
    #[serde(default)]
    pub csv: Option<CsvOptions>,
    /// Column widths (fixed-width only)
    #[serde(default)]
    pub column_widths: Option<Vec<FixedWidthColumn>>,
    /// Expected number of destination columns
    #[serde(default)]
    pub column_count: Option<usize>,
    /// Path-mapping file URI (JSON with path file, optionally Avro)
    #[serde(default)]
    pub path_file: Option<String>,
    /// Explicit destination column list
    #[serde(default)]
    pub columns: Vec<String>,
    /// Authorization for the source read
    #[serde(default)]
    pub authorization: LoadAuthorization,
    /// Shared load options
    #[serde(default)]
    pub options: LoadOptions,
}

impl LoadSpec {
    /// Creates a spec with no format and default options.
    pub fn new(
        source_kind: SourceKind,
        source_location: impl Into<String>,
        destination_table: impl Into<String>,
    ) -> Self {
        Self {
            source_kind,
            source_location: source_location.into(),
            destination_table: destination_table.into(),
            format: None,
            csv: None,
            column_widths: None,
            column_count: None,
            path_file: None,
            columns: Vec::new(),
            authorization: LoadAuthorization::Secrets,
            options: LoadOptions::default(),
        }
    }

    /// Sets the data format.
    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets delimited-text options.
    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.csv = Some(csv);
        self
    }

    /// Sets fixed-width columns.
    pub fn with_column_widths(mut self, widths: Vec<FixedWidthColumn>) -> Self {
        self.column_widths = Some(widths);
        self
    }

    /// Sets the expected destination column count.
    pub fn with_column_count(mut self, count: usize) -> Self {
        self.column_count = Some(count);
        self
    }

    /// Sets the path-mapping file.
    pub fn with_path_file(mut self, uri: impl Into<String>) -> Self {
        self.path_file = Some(uri.into());
        self
    }

    /// Sets the destination column list.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the authorization.
    pub fn with_authorization(mut self, authorization: LoadAuthorization) -> Self {
        self.authorization = authorization;
        self
    }

    /// Sets the shared options.
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// NoSQL table name from a `dynamodb://` location.
    pub fn nosql_table(&self) -> Option<&str> {
        self.source_location
            .strip_prefix(NOSQL_SCHEME)
            .filter(|t| !t.is_empty())
    }

    /// Checks the request without touching the network.
    ///
    /// # Errors
    /// Returns a configuration error describing the first violation.
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.destination_table)?;
        for column in &self.columns {
            validate_identifier("column", column)?;
        }
        if let Some(count) = self.column_count {
            if count == 0 {
                return Err(RedloadError::configuration("column_count must be greater than 0"));
            }
            if !self.columns.is_empty() && self.columns.len() != count {
                return Err(RedloadError::configuration(format!(
                    "column_count is {} but {} columns are listed",
                    count,
                    self.columns.len()
                )));
            }
        }
        self.validate_authorization()?;
        self.validate_region()?;

        if self.source_kind.is_object_storage() {
            self.validate_object_storage()
        } else {
            self.validate_nosql()
        }
    }

    fn validate_authorization(&self) -> Result<()> {
        if let LoadAuthorization::IamRole { arn } = &self.authorization
            && (!arn.starts_with("arn:") || arn.contains('\''))
        {
            return Err(RedloadError::configuration(format!(
                "'{}' is not a role ARN",
                arn
            )));
        }
        Ok(())
    }

    fn validate_region(&self) -> Result<()> {
        match &self.options.region {
            Some(region) if !KNOWN_REGIONS.contains(&region.as_str()) => Err(
                RedloadError::configuration(format!("Illegal AWS region: {}", region)),
            ),
            _ => Ok(()),
        }
    }

    fn validate_nosql(&self) -> Result<()> {
        if self.nosql_table().is_none() {
            return Err(RedloadError::configuration(format!(
                "NoSQL source must be {}<table>, got '{}'",
                NOSQL_SCHEME, self.source_location
            )));
        }

        let mut rejected = Vec::new();
        if self.format.is_some() {
            rejected.push("format");
        }
        if self.csv.is_some() {
            rejected.push("csv");
        }
        if self.column_widths.is_some() {
            rejected.push("column_widths");
        }
        if self.path_file.is_some() {
            rejected.push("path_file");
        }
        let options = &self.options;
        if options.compression.is_some() {
            rejected.push("compression");
        }
        if options.max_error.is_some() {
            rejected.push("max_error");
        }
        if options.time_format.is_some() {
            rejected.push("time_format");
        }
        if options.date_format.is_some() {
            rejected.push("date_format");
        }
        if options.truncate_columns {
            rejected.push("truncate_columns");
        }
        if options.no_load {
            rejected.push("no_load");
        }
        if !rejected.is_empty() {
            return Err(RedloadError::configuration(format!(
                "NoSQL table loads do not accept {}",
                rejected.join(", ")
            )));
        }

        if let Some(ratio) = options.read_ratio
            && !(1..=200).contains(&ratio)
        {
            return Err(RedloadError::configuration(format!(
                "read_ratio must be between 1 and 200, got {}",
                ratio
            )));
        }
        Ok(())
    }

    fn validate_object_storage(&self) -> Result<()> {
        S3Location::parse(&self.source_location)?;

        if self.options.read_ratio.is_some() {
            return Err(RedloadError::configuration(
                "read_ratio applies only to NoSQL table loads",
            ));
        }

        let format = self.format.ok_or_else(|| {
            RedloadError::configuration("format is required for object-storage loads")
        })?;

        if self.csv.is_some() && format != DataFormat::Csv {
            return Err(RedloadError::configuration(format!(
                "csv options do not apply to {:?}",
                format
            )));
        }
        if self.column_widths.is_some() && format != DataFormat::FixedWidth {
            return Err(RedloadError::configuration(format!(
                "column_widths do not apply to {:?}",
                format
            )));
        }

        match format {
            DataFormat::Csv => self.validate_csv()?,
            DataFormat::FixedWidth => self.validate_fixed_width()?,
            DataFormat::Json | DataFormat::JsonWithPathFile | DataFormat::Avro => {}
        }

        match (format, &self.path_file) {
            (DataFormat::JsonWithPathFile, None) => Err(RedloadError::configuration(
                "JSON with path file requires path_file",
            )),
            (DataFormat::Json, Some(_)) => Err(RedloadError::configuration(
                "plain JSON matches keys to columns; use json_with_path_file for a path file",
            )),
            (DataFormat::Csv | DataFormat::FixedWidth, Some(_)) => Err(
                RedloadError::configuration(format!("path_file does not apply to {:?}", format)),
            ),
            (_, Some(path)) => S3Location::parse(path).map(|_| ()),
            (_, None) => Ok(()),
        }
    }

    fn validate_csv(&self) -> Result<()> {
        let Some(csv) = &self.csv else {
            return Ok(());
        };
        if csv.escape && csv.quote.is_some() {
            return Err(RedloadError::configuration(
                "escape and quote cannot be combined",
            ));
        }
        for (name, value) in [("delimiter", csv.delimiter), ("quote", csv.quote)] {
            if value.is_some_and(|c| c == '\n' || c == '\r' || c == '\\') {
                return Err(RedloadError::configuration(format!(
                    "{} cannot be a line break or backslash",
                    name
                )));
            }
        }
        if csv.delimiter.is_some() && csv.delimiter == csv.quote {
            return Err(RedloadError::configuration(
                "delimiter and quote must differ",
            ));
        }
        Ok(())
    }

    fn validate_fixed_width(&self) -> Result<()> {
        let widths = self
            .column_widths
            .as_ref()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| {
                RedloadError::configuration("fixed-width loads require column_widths")
            })?;
        for column in widths {
            validate_identifier("fixed-width label", &column.label)?;
            if column.width == 0 {
                return Err(RedloadError::configuration(format!(
                    "fixed-width column '{}' has zero width",
                    column.label
                )));
            }
        }
        if let Some(count) = self.column_count
            && count != widths.len()
        {
            return Err(RedloadError::configuration(format!(
                "column_count is {} but {} widths are given",
                count,
                widths.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_spec() -> LoadSpec {
        LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://bucket/data/", "dest")
            .with_format(DataFormat::Csv)
    }

    fn assert_config_error(spec: &LoadSpec, needle: &str) {
        match spec.validate() {
            Err(RedloadError::Configuration { message }) => {
                assert!(message.contains(needle), "{:?} lacks {:?}", message, needle);
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_specs() {
        assert!(csv_spec().validate().is_ok());
        assert!(
            LoadSpec::new(SourceKind::ObjectStorageManifest, "s3://b/manifest.json", "s.t")
                .with_format(DataFormat::Avro)
                .validate()
                .is_ok()
        );
        assert!(
            LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
                .with_options(LoadOptions {
                    read_ratio: Some(200),
                    region: Some("us-west-2".to_string()),
                    ..LoadOptions::default()
                })
                .validate()
                .is_ok()
        );
        assert!(
            LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/fw/", "dest")
                .with_format(DataFormat::FixedWidth)
                .with_column_widths(vec![FixedWidthColumn::new("id", 4)])
                .with_column_count(1)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_nosql_rejects_format_and_storage_options() {
        let spec = LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
            .with_format(DataFormat::Csv);
        assert_config_error(&spec, "format");

        let spec = LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
            .with_options(LoadOptions {
                compression: Some(Compression::Gzip),
                truncate_columns: true,
                ..LoadOptions::default()
            });
        assert_config_error(&spec, "compression, truncate_columns");

        let spec = LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
            .with_options(LoadOptions {
                no_load: true,
                ..LoadOptions::default()
            });
        assert_config_error(&spec, "no_load");

        let spec = LoadSpec::new(SourceKind::NoSqlTable, "s3://bucket/x", "dest");
        assert_config_error(&spec, "dynamodb://");

        let spec = LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
            .with_options(LoadOptions {
                read_ratio: Some(0),
                ..LoadOptions::default()
            });
        assert_config_error(&spec, "read_ratio");
    }

    #[test]
    fn test_object_storage_requires_format_and_s3() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://bucket/x", "dest");
        assert_config_error(&spec, "format is required");

        let spec = LoadSpec::new(SourceKind::ObjectStorageManifest, "dynamodb://T", "dest")
            .with_format(DataFormat::Json);
        assert_config_error(&spec, "s3://");

        let spec = csv_spec().with_options(LoadOptions {
            read_ratio: Some(10),
            ..LoadOptions::default()
        });
        assert_config_error(&spec, "read_ratio");
    }

    #[test]
    fn test_format_option_mismatches() {
        let spec = csv_spec().with_column_widths(vec![FixedWidthColumn::new("a", 1)]);
        assert_config_error(&spec, "column_widths");

        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/j/", "dest")
            .with_format(DataFormat::Json)
            .with_csv(CsvOptions::default());
        assert_config_error(&spec, "csv options");

        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/fw/", "dest")
            .with_format(DataFormat::FixedWidth);
        assert_config_error(&spec, "column_widths");

        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/j/", "dest")
            .with_format(DataFormat::JsonWithPathFile);
        assert_config_error(&spec, "path_file");

        let spec = csv_spec().with_path_file("s3://b/paths.json");
        assert_config_error(&spec, "path_file");

        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/j/", "dest")
            .with_format(DataFormat::Json)
            .with_path_file("s3://b/paths.json");
        assert_config_error(&spec, "json_with_path_file");
    }

    #[test]
    fn test_csv_option_conflicts() {
        let spec = csv_spec().with_csv(CsvOptions {
            escape: true,
            quote: Some('"'),
            ..CsvOptions::default()
        });
        assert_config_error(&spec, "escape and quote");

        let spec = csv_spec().with_csv(CsvOptions {
            delimiter: Some('|'),
            quote: Some('|'),
            ..CsvOptions::default()
        });
        assert_config_error(&spec, "must differ");
    }

    #[test]
    fn test_identifiers_region_and_role() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/", "dest; drop")
            .with_format(DataFormat::Csv);
        assert_config_error(&spec, "table name");

        let spec = csv_spec().with_columns(["id", "bad col"]);
        assert_config_error(&spec, "column name");

        let spec = csv_spec().with_options(LoadOptions {
            region: Some("moon-base-1".to_string()),
            ..LoadOptions::default()
        });
        assert_config_error(&spec, "Illegal AWS region: moon-base-1");

        let spec = csv_spec().with_authorization(LoadAuthorization::IamRole {
            arn: "role/loader".to_string(),
        });
        assert_config_error(&spec, "role ARN");
    }

    #[test]
    fn test_deserialize_load_step() {
        let spec: LoadSpec = serde_json::from_str(
            r#"{
                "source_kind": "object_storage_manifest",
                "source_location": "s3://bucket/manifest.json",
                "destination_table": "dest",
                "format": "csv",
                "csv": {"delimiter": "|", "ignore_header": 1},
                "authorization": {"type": "iam_role", "arn": "arn:aws:iam::123456789012:role/Loader"},
                "options": {"compression": "gzip", "max_error": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.source_kind, SourceKind::ObjectStorageManifest);
        assert_eq!(spec.csv.as_ref().and_then(|c| c.delimiter), Some('|'));
        assert_eq!(spec.options.compression, Some(Compression::Gzip));
        assert!(spec.validate().is_ok());
    }
}
