//! COPY statement rendering.
//!
//! The statement is rendered twice from the same clauses: once with the real
//! authorization and once with it masked. Only the masked form may be logged
//! or shown in errors.

use super::spec::{
    CsvOptions, DEFAULT_READ_RATIO, DataFormat, LoadAuthorization, LoadSpec, SourceKind,
};
use crate::Result;
use crate::secrets::{AwsCredentials, SecretLookup};
use crate::validation::quote_literal;
use std::fmt;
use zeroize::Zeroizing;

const MASK: &str = "'****'";

/// A rendered COPY statement.
///
/// `Debug` and `Display` show the redacted form.
pub struct CopyStatement {
    text: Zeroizing<String>,
    redacted: String,
    table: String,
}

impl CopyStatement {
    /// Executable text, including credentials. Never log it.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text with the credentials clause masked.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    /// Destination table.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Debug for CopyStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyStatement")
            .field("redacted", &self.redacted)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CopyStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

/// Renders a [`LoadSpec`] into a [`CopyStatement`].
///
/// # Example
/// ```rust
/// use redload_core::load::{CopyStatementBuilder, DataFormat, LoadSpec, SourceKind};
/// use redload_core::secrets::{MapSecrets, SecretKey};
///
/// let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://fixtures/csv/", "dest")
///     .with_format(DataFormat::Csv);
/// let secrets = MapSecrets::new()
///     .with(SecretKey::AccessKeyId, "AKIAEXAMPLE")
///     .with(SecretKey::SecretAccessKey, "wJalrXUtnFEMI");
///
/// let statement = CopyStatementBuilder::new(&spec).build(&secrets).unwrap();
/// assert_eq!(
///     statement.redacted(),
///     "COPY dest FROM 's3://fixtures/csv/' ACCESS_KEY_ID '****' SECRET_ACCESS_KEY '****' CSV"
/// );
/// assert!(statement.text().contains("AKIAEXAMPLE"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CopyStatementBuilder<'s> {
    spec: &'s LoadSpec,
}

impl<'s> CopyStatementBuilder<'s> {
    /// Creates a builder for `spec`.
    pub fn new(spec: &'s LoadSpec) -> Self {
        Self { spec }
    }

    /// Validates the spec, resolves authorization and renders the statement.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid spec or absent AWS
    /// secrets. Nothing here touches the network.
    pub fn build(&self, secrets: &dyn SecretLookup) -> Result<CopyStatement> {
        self.spec.validate()?;

        let (authorization, masked) = match &self.spec.authorization {
            LoadAuthorization::Secrets => {
                let credentials = AwsCredentials::from_secrets(secrets)?;
                (
                    credentials_clause(&credentials),
                    masked_credentials_clause(&credentials),
                )
            }
            LoadAuthorization::IamRole { arn } => {
                let clause = format!("IAM_ROLE {}", quote_literal(arn));
                (Zeroizing::new(clause.clone()), clause)
            }
        };

        let head = self.head();
        let tail = self.tail();
        let text = Zeroizing::new(join(&head, &authorization, &tail));
        let redacted = join(&head, &masked, &tail);

        Ok(CopyStatement {
            text,
            redacted,
            table: self.spec.destination_table.clone(),
        })
    }

    /// `COPY table [(columns)] FROM 'source'`
    fn head(&self) -> String {
        let spec = self.spec;
        let mut head = format!("COPY {}", spec.destination_table);
        if !spec.columns.is_empty() {
            head.push_str(&format!(" ({})", spec.columns.join(", ")));
        }
        head.push_str(&format!(" FROM {}", quote_literal(&spec.source_location)));
        head
    }

    /// Everything after the authorization clause.
    fn tail(&self) -> Vec<String> {
        let spec = self.spec;
        let options = &spec.options;
        let mut clauses = Vec::new();

        if spec.source_kind == SourceKind::ObjectStorageManifest {
            clauses.push("MANIFEST".to_string());
        }
        if let Some(format) = spec.format {
            self.format_clauses(format, &mut clauses);
        }
        if let Some(region) = &options.region {
            clauses.push(format!("REGION {}", quote_literal(region)));
        }
        if let Some(compression) = options.compression {
            clauses.push(compression.keyword().to_string());
        }
        if let Some(max_error) = options.max_error {
            clauses.push(format!("MAXERROR {}", max_error));
        }
        if let Some(time_format) = &options.time_format {
            clauses.push(format!("TIMEFORMAT {}", quote_literal(time_format)));
        }
        if let Some(date_format) = &options.date_format {
            clauses.push(format!("DATEFORMAT {}", quote_literal(date_format)));
        }
        if options.truncate_columns {
            clauses.push("TRUNCATECOLUMNS".to_string());
        }
        if options.no_load {
            clauses.push("NOLOAD".to_string());
        }
        if let Some(on) = options.comp_update {
            clauses.push(format!("COMPUPDATE {}", on_off(on)));
        }
        if let Some(on) = options.stat_update {
            clauses.push(format!("STATUPDATE {}", on_off(on)));
        }
        if spec.source_kind == SourceKind::NoSqlTable {
            clauses.push(format!(
                "READRATIO {}",
                options.read_ratio.unwrap_or(DEFAULT_READ_RATIO)
            ));
        }
        clauses
    }

    fn format_clauses(&self, format: DataFormat, clauses: &mut Vec<String>) {
        let spec = self.spec;
        match format {
            DataFormat::Csv => csv_clauses(spec.csv.as_ref(), clauses),
            DataFormat::FixedWidth => {
                let widths = spec
                    .column_widths
                    .iter()
                    .flatten()
                    .map(|c| format!("{}:{}", c.label, c.width))
                    .collect::<Vec<_>>()
                    .join(",");
                clauses.push(format!("FIXEDWIDTH {}", quote_literal(&widths)));
            }
            DataFormat::Json => clauses.push("JSON 'auto'".to_string()),
            DataFormat::JsonWithPathFile => clauses.push(format!(
                "JSON {}",
                quote_literal(spec.path_file.as_deref().unwrap_or("auto"))
            )),
            DataFormat::Avro => clauses.push(format!(
                "FORMAT AS AVRO {}",
                quote_literal(spec.path_file.as_deref().unwrap_or("auto"))
            )),
        }
    }
}

fn csv_clauses(csv: Option<&CsvOptions>, clauses: &mut Vec<String>) {
    let Some(csv) = csv else {
        clauses.push("CSV".to_string());
        return;
    };

    if csv.escape {
        // Escaped input is loaded as delimited text; CSV mode has no ESCAPE
        if let Some(delimiter) = csv.delimiter {
            clauses.push(format!(
                "DELIMITER {}",
                quote_literal(&delimiter.to_string())
            ));
        }
        clauses.push("ESCAPE".to_string());
    } else {
        clauses.push("CSV".to_string());
        if let Some(delimiter) = csv.delimiter {
            clauses.push(format!(
                "DELIMITER {}",
                quote_literal(&delimiter.to_string())
            ));
        }
        if let Some(quote) = csv.quote {
            clauses.push(format!("QUOTE AS {}", quote_literal(&quote.to_string())));
        }
    }
    if let Some(lines) = csv.ignore_header {
        clauses.push(format!("IGNOREHEADER {}", lines));
    }
    if let Some(null_as) = &csv.null_as {
        clauses.push(format!("NULL AS {}", quote_literal(null_as)));
    }
    if csv.empty_as_null {
        clauses.push("EMPTYASNULL".to_string());
    }
    if csv.blanks_as_null {
        clauses.push("BLANKSASNULL".to_string());
    }
}

fn credentials_clause(credentials: &AwsCredentials) -> Zeroizing<String> {
    let mut clause = Zeroizing::new(format!(
        "ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}",
        quote_literal(credentials.access_key_id()),
        quote_literal(credentials.secret_access_key())
    ));
    if let Some(token) = credentials.session_token() {
        clause.push_str(&format!(" SESSION_TOKEN {}", quote_literal(token)));
    }
    clause
}

fn masked_credentials_clause(credentials: &AwsCredentials) -> String {
    let mut clause = format!("ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}", MASK, MASK);
    if credentials.session_token().is_some() {
        clause.push_str(&format!(" SESSION_TOKEN {}", MASK));
    }
    clause
}

fn join(head: &str, authorization: &str, tail: &[String]) -> String {
    let mut statement = format!("{} {}", head, authorization);
    for clause in tail {
        statement.push(' ');
        statement.push_str(clause);
    }
    statement
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RedloadError;
    use crate::load::{Compression, FixedWidthColumn, LoadOptions};
    use crate::secrets::{MapSecrets, SecretKey};

    fn secrets() -> MapSecrets {
        MapSecrets::new()
            .with(SecretKey::AccessKeyId, "AKIAEXAMPLE")
            .with(SecretKey::SecretAccessKey, "wJalr'XUtn")
    }

    fn build(spec: &LoadSpec) -> CopyStatement {
        CopyStatementBuilder::new(spec).build(&secrets()).unwrap()
    }

    #[test]
    fn test_csv_prefix_load() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/csv/", "dest")
            .with_format(DataFormat::Csv)
            .with_columns(["id", "name", "score"]);
        let statement = build(&spec);

        assert_eq!(
            statement.text(),
            "COPY dest (id, name, score) FROM 's3://b/csv/' \
             ACCESS_KEY_ID 'AKIAEXAMPLE' SECRET_ACCESS_KEY 'wJalr''XUtn' CSV"
        );
        assert_eq!(statement.table(), "dest");
    }

    #[test]
    fn test_redacted_form_hides_every_secret() {
        let secrets = secrets().with(SecretKey::SessionToken, "FQoGZXIvYXdz");
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/csv/", "dest")
            .with_format(DataFormat::Csv);
        let statement = CopyStatementBuilder::new(&spec).build(&secrets).unwrap();

        for form in [
            statement.redacted().to_string(),
            statement.to_string(),
            format!("{:?}", statement),
        ] {
            assert!(!form.contains("AKIAEXAMPLE"));
            assert!(!form.contains("wJalr"));
            assert!(!form.contains("FQoGZXIvYXdz"));
            assert!(form.contains("SESSION_TOKEN '****'"));
        }
        assert!(statement.text().contains("SESSION_TOKEN 'FQoGZXIvYXdz'"));
    }

    #[test]
    fn test_manifest_csv_with_options() {
        let spec = LoadSpec::new(SourceKind::ObjectStorageManifest, "s3://b/m.json", "s.dest")
            .with_format(DataFormat::Csv)
            .with_csv(CsvOptions {
                delimiter: Some('|'),
                quote: Some('%'),
                ignore_header: Some(1),
                null_as: Some("\\N".to_string()),
                empty_as_null: true,
                blanks_as_null: true,
                escape: false,
            })
            .with_options(LoadOptions {
                region: Some("us-west-2".to_string()),
                compression: Some(Compression::Gzip),
                max_error: Some(10),
                time_format: Some("auto".to_string()),
                date_format: Some("YYYY-MM-DD".to_string()),
                truncate_columns: true,
                comp_update: Some(false),
                stat_update: Some(true),
                read_ratio: None,
                no_load: false,
            });

        assert_eq!(
            build(&spec).redacted(),
            "COPY s.dest FROM 's3://b/m.json' ACCESS_KEY_ID '****' SECRET_ACCESS_KEY '****' \
             MANIFEST CSV DELIMITER '|' QUOTE AS '%' IGNOREHEADER 1 NULL AS '\\\\N' EMPTYASNULL \
             BLANKSASNULL REGION 'us-west-2' GZIP MAXERROR 10 TIMEFORMAT 'auto' \
             DATEFORMAT 'YYYY-MM-DD' TRUNCATECOLUMNS COMPUPDATE OFF STATUPDATE ON"
        );
    }

    #[test]
    fn test_escaped_text_load() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/t/", "dest")
            .with_format(DataFormat::Csv)
            .with_csv(CsvOptions {
                escape: true,
                ..CsvOptions::default()
            });
        assert!(build(&spec).redacted().ends_with("SECRET_ACCESS_KEY '****' ESCAPE"));

        let spec = spec.with_csv(CsvOptions {
            delimiter: Some('|'),
            escape: true,
            ..CsvOptions::default()
        });
        assert!(build(&spec).redacted().ends_with("'****' DELIMITER '|' ESCAPE"));
    }

    #[test]
    fn test_no_load_validates_without_loading() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/csv/", "dest")
            .with_format(DataFormat::Csv)
            .with_options(LoadOptions {
                max_error: Some(5),
                no_load: true,
                ..LoadOptions::default()
            });
        assert!(build(&spec).redacted().ends_with("CSV MAXERROR 5 NOLOAD"));
    }

    #[test]
    fn test_fixed_width() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/fw/", "dest")
            .with_format(DataFormat::FixedWidth)
            .with_column_widths(vec![
                FixedWidthColumn::new("id", 3),
                FixedWidthColumn::new("name", 10),
            ]);
        assert!(build(&spec).redacted().ends_with("FIXEDWIDTH 'id:3,name:10'"));
    }

    #[test]
    fn test_json_and_avro_clauses() {
        let json = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/j/", "dest")
            .with_format(DataFormat::Json);
        assert!(build(&json).redacted().ends_with("JSON 'auto'"));

        let mapped = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/j/", "dest")
            .with_format(DataFormat::JsonWithPathFile)
            .with_path_file("s3://b/jsonpaths.json");
        assert!(build(&mapped).redacted().ends_with("JSON 's3://b/jsonpaths.json'"));

        let avro = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/a/", "dest")
            .with_format(DataFormat::Avro);
        assert!(build(&avro).redacted().ends_with("FORMAT AS AVRO 'auto'"));

        let avro_mapped = avro.clone().with_path_file("s3://b/avropaths.json");
        assert!(
            build(&avro_mapped)
                .redacted()
                .ends_with("FORMAT AS AVRO 's3://b/avropaths.json'")
        );
    }

    #[test]
    fn test_nosql_table_load() {
        let spec = LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest");
        assert_eq!(
            build(&spec).redacted(),
            "COPY dest FROM 'dynamodb://Orders' \
             ACCESS_KEY_ID '****' SECRET_ACCESS_KEY '****' READRATIO 50"
        );
    }

    #[test]
    fn test_iam_role_authorization() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/j/", "dest")
            .with_format(DataFormat::Json)
            .with_authorization(LoadAuthorization::IamRole {
                arn: "arn:aws:iam::123456789012:role/Loader".to_string(),
            });
        // No AWS secrets needed
        let statement = CopyStatementBuilder::new(&spec)
            .build(&MapSecrets::new())
            .unwrap();
        assert_eq!(statement.text(), statement.redacted());
        assert!(
            statement
                .text()
                .contains("IAM_ROLE 'arn:aws:iam::123456789012:role/Loader'")
        );
    }

    #[test]
    fn test_missing_aws_secret_is_config_error() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/", "dest")
            .with_format(DataFormat::Csv);
        let err = CopyStatementBuilder::new(&spec)
            .build(&MapSecrets::new())
            .unwrap_err();
        assert!(matches!(err, RedloadError::Configuration { .. }));
        assert!(err.to_string().contains("access-key-id"));
    }

    #[test]
    fn test_source_location_is_quoted() {
        let spec = LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/o'brien/", "dest")
            .with_format(DataFormat::Csv);
        assert!(build(&spec).text().contains("FROM 's3://b/o''brien/'"));
    }

    #[test]
    fn test_backslash_in_literals_cannot_close_them() {
        let spec = LoadSpec::new(
            SourceKind::ObjectStoragePrefix,
            r"s3://b/x\'; DROP TABLE dest; --",
            "dest",
        )
        .with_format(DataFormat::Csv);
        let secrets = MapSecrets::new()
            .with(SecretKey::AccessKeyId, "AKIAEXAMPLE")
            .with(SecretKey::SecretAccessKey, "ends-with\\");
        let statement = CopyStatementBuilder::new(&spec).build(&secrets).unwrap();

        let expected = concat!(
            r"COPY dest FROM 's3://b/x\\''; DROP TABLE dest; --' ",
            r"ACCESS_KEY_ID 'AKIAEXAMPLE' SECRET_ACCESS_KEY 'ends-with\\' CSV"
        );
        assert_eq!(statement.text(), expected);
    }
}
