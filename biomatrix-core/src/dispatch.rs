//! Picking a parser for a matrix file
//!
//! Candidates are tried in a fixed order until one accepts the file:
//! parsers registered by the caller first, then the built-in formats. A
//! candidate declines by returning `Ok(None)` or an error; either way the
//! dispatcher moves on, and what each candidate reported is kept in a
//! labelled log that is attached to the final error when nothing fits.

use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::codec::ValueCodec;
use crate::config::ParallelOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::io;
use crate::matrix::MatrixRef;
use crate::store::{AccessPolicy, RowKeyIndex, RowKeyedStructMatrix};

/// Characters of the first line quoted in a parse error
const FIRST_LINE_CHARS: usize = 120;

/// One message reported by a parser candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    pub label: String,
    pub message: String,
}

/// Messages collected from parser candidates, grouped by candidate label
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    label: String,
    entries: Vec<DiagnosticEntry>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute following notes to `label`
    pub fn begin(&mut self, label: &str) {
        self.label = label.to_string();
    }

    pub fn note<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        log::debug!("[{}] {}", self.label, message);
        self.entries.push(DiagnosticEntry {
            label: self.label.clone(),
            message,
        });
    }

    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Notes recorded under one label
    pub fn for_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.label == label)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "[{}] {}", entry.label, entry.message)?;
        }
        Ok(())
    }
}

/// A caller-supplied parser: `Ok(None)` declines the file
pub type UserParser<V> =
    Arc<dyn Fn(&Path, &V, &ParallelOptions, &mut Diagnostics) -> MatrixResult<Option<MatrixRef<V>>> + Send + Sync>;

type SequentialFn<C> = fn(&Path, &C, &mut Diagnostics) -> MatrixResult<Option<MatrixRef<<C as ValueCodec>::Value>>>;
type ParallelFn<C> =
    fn(&Path, &C, &ParallelOptions, &mut Diagnostics) -> MatrixResult<Option<MatrixRef<<C as ValueCodec>::Value>>>;

/// A built-in format with its sequential and parallel entry points
pub struct FormatEntry<C: ValueCodec> {
    pub name: &'static str,
    pub sequential: Option<SequentialFn<C>>,
    pub parallel: Option<ParallelFn<C>>,
}

enum Resolved<C: ValueCodec> {
    Sequential(SequentialFn<C>),
    Parallel(ParallelFn<C>),
}

/// Built-in formats in the order they are tried
pub fn builtin_formats<C: ValueCodec>() -> Vec<FormatEntry<C>> {
    vec![
        FormatEntry {
            name: "row-keyed-struct",
            sequential: Some(parse_row_keyed::<C>),
            parallel: None,
        },
        FormatEntry {
            name: "dense-struct",
            sequential: Some(parse_dense_struct::<C>),
            parallel: Some(parse_dense_struct_parallel::<C>),
        },
        FormatEntry {
            name: "sparse",
            sequential: Some(parse_sparse::<C>),
            parallel: None,
        },
        FormatEntry {
            name: "dense-tab",
            sequential: Some(parse_dense_tab::<C>),
            parallel: None,
        },
    ]
}

fn parse_row_keyed<C: ValueCodec>(
    path: &Path,
    codec: &C,
    diagnostics: &mut Diagnostics,
) -> MatrixResult<Option<MatrixRef<C::Value>>> {
    let side = RowKeyIndex::side_path(path);
    if !side.is_file() {
        diagnostics.note(format!("no side index at {}", side.display()));
        return Ok(None);
    }
    let matrix = RowKeyedStructMatrix::open_with_index(path, &side, codec.clone(), AccessPolicy::SharedRead)?;
    Ok(Some(Arc::new(matrix)))
}

fn parse_dense_struct<C: ValueCodec>(
    path: &Path,
    codec: &C,
    _diagnostics: &mut Diagnostics,
) -> MatrixResult<Option<MatrixRef<C::Value>>> {
    Ok(Some(Arc::new(io::read_packed(path, codec.clone())?)))
}

fn parse_dense_struct_parallel<C: ValueCodec>(
    path: &Path,
    codec: &C,
    options: &ParallelOptions,
    _diagnostics: &mut Diagnostics,
) -> MatrixResult<Option<MatrixRef<C::Value>>> {
    Ok(Some(Arc::new(io::read_packed_parallel(path, codec.clone(), options)?)))
}

fn parse_sparse<C: ValueCodec>(
    path: &Path,
    codec: &C,
    _diagnostics: &mut Diagnostics,
) -> MatrixResult<Option<MatrixRef<C::Value>>> {
    Ok(Some(Arc::new(io::read_sparse(path, codec)?)))
}

fn parse_dense_tab<C: ValueCodec>(
    path: &Path,
    codec: &C,
    _diagnostics: &mut Diagnostics,
) -> MatrixResult<Option<MatrixRef<C::Value>>> {
    Ok(Some(Arc::new(io::read_tab(path, codec)?)))
}

/// Tries registered parsers, then built-in formats, for one codec
pub struct FormatDispatcher<C: ValueCodec> {
    codec: C,
    user: Vec<(String, UserParser<C::Value>)>,
    builtin: Vec<(&'static str, Resolved<C>)>,
    last_log: Mutex<Diagnostics>,
}

impl<C: ValueCodec> FormatDispatcher<C> {
    pub fn new(codec: C) -> Self {
        let builtin = builtin_formats::<C>()
            .into_iter()
            .filter_map(|entry| {
                let resolved = match (entry.parallel, entry.sequential) {
                    (Some(parallel), _) => Resolved::Parallel(parallel),
                    (None, Some(sequential)) => Resolved::Sequential(sequential),
                    (None, None) => return None,
                };
                Some((entry.name, resolved))
            })
            .collect();
        Self {
            codec,
            user: Vec::new(),
            builtin,
            last_log: Mutex::new(Diagnostics::new()),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Add a parser tried before the built-in formats, after earlier registrations
    pub fn register<F>(&mut self, label: &str, parser: F)
    where
        F: Fn(&Path, &C::Value, &ParallelOptions, &mut Diagnostics) -> MatrixResult<Option<MatrixRef<C::Value>>>
            + Send
            + Sync
            + 'static,
    {
        self.user.push((label.to_string(), Arc::new(parser)));
    }

    /// Labels of every candidate, in the order they are tried
    pub fn candidates(&self) -> Vec<&str> {
        self.user
            .iter()
            .map(|(label, _)| label.as_str())
            .chain(self.builtin.iter().map(|(name, _)| *name))
            .collect()
    }

    /// First candidate's matrix, or `Ok(None)` when every candidate declines
    ///
    /// Only a missing file is an error. The candidates' notes are available
    /// afterwards from [`FormatDispatcher::last_log`].
    pub fn try_parse<P: AsRef<Path>>(
        &self,
        path: P,
        missing: &C::Value,
        options: &ParallelOptions,
    ) -> MatrixResult<Option<MatrixRef<C::Value>>> {
        Ok(self.try_parse_logged(path, missing, options)?.0)
    }

    /// Like `try_parse`, also returning the notes of this attempt
    ///
    /// The returned log belongs to this call even when other threads parse
    /// through the same dispatcher; `last_log` only holds whichever attempt
    /// finished last.
    pub fn try_parse_logged<P: AsRef<Path>>(
        &self,
        path: P,
        missing: &C::Value,
        options: &ParallelOptions,
    ) -> MatrixResult<(Option<MatrixRef<C::Value>>, Diagnostics)> {
        let path = path.as_ref();
        std::fs::metadata(path)?;
        let mut diagnostics = Diagnostics::new();
        let found = self.run_candidates(path, missing, options, &mut diagnostics);
        *self.last_log.lock() = diagnostics.clone();
        Ok((found, diagnostics))
    }

    /// Like `try_parse`, but exhausting every candidate is a [`MatrixError::Parse`]
    pub fn parse<P: AsRef<Path>>(
        &self,
        path: P,
        missing: &C::Value,
        options: &ParallelOptions,
    ) -> MatrixResult<MatrixRef<C::Value>> {
        let path = path.as_ref();
        let (found, diagnostics) = self.try_parse_logged(path, missing, options)?;
        if let Some(matrix) = found {
            return Ok(matrix);
        }
        Err(MatrixError::Parse {
            file: path.display().to_string(),
            first_line: io::first_line(path, FIRST_LINE_CHARS).unwrap_or_default(),
            log: diagnostics.to_string(),
        })
    }

    /// Notes from the most recent `try_parse` or `parse`
    pub fn last_log(&self) -> Diagnostics {
        self.last_log.lock().clone()
    }

    fn run_candidates(
        &self,
        path: &Path,
        missing: &C::Value,
        options: &ParallelOptions,
        diagnostics: &mut Diagnostics,
    ) -> Option<MatrixRef<C::Value>> {
        for (label, parser) in &self.user {
            diagnostics.begin(label);
            if let Some(matrix) = settle(parser(path, missing, options, diagnostics), diagnostics) {
                log::debug!("{} parsed by {}", path.display(), label);
                return Some(matrix);
            }
        }

        let codec_missing = self.codec.missing_value();
        for (name, resolved) in &self.builtin {
            diagnostics.begin(name);
            if !self.codec.is_missing(missing) {
                diagnostics.note(format!(
                    "{} codec stores {:?} as missing, not {:?}",
                    self.codec.name(),
                    codec_missing,
                    missing
                ));
                continue;
            }
            let outcome = match resolved {
                Resolved::Parallel(parse) => parse(path, &self.codec, options, diagnostics),
                Resolved::Sequential(parse) => parse(path, &self.codec, diagnostics),
            };
            if let Some(matrix) = settle(outcome, diagnostics) {
                log::debug!("{} parsed as {}", path.display(), name);
                return Some(matrix);
            }
        }
        None
    }
}

fn settle<V>(outcome: MatrixResult<Option<V>>, diagnostics: &mut Diagnostics) -> Option<V> {
    match outcome {
        Ok(Some(matrix)) => Some(matrix),
        Ok(None) => {
            diagnostics.note("declined");
            None
        }
        Err(e) => {
            diagnostics.note(e.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FloatCodec, PairCodec};
    use crate::matrix::ViewKind;
    use crate::store::DenseMatrix;
    use crate::value::UoPair;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_builtin_order() {
        let dispatcher = FormatDispatcher::new(PairCodec);
        assert_eq!(
            dispatcher.candidates(),
            vec!["row-keyed-struct", "dense-struct", "sparse", "dense-tab"]
        );
    }

    #[test]
    fn test_registered_parsers_run_first() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "m.txt", "var\tc1\nr1\tab\n");
        let mut dispatcher = FormatDispatcher::new(PairCodec);
        dispatcher.register("always-fails", |_, _, _, diagnostics| {
            diagnostics.note("not my format");
            Err(MatrixError::format("nope"))
        });
        dispatcher.register("custom", |_, missing: &UoPair, _, _| {
            let m = DenseMatrix::new_missing(["x"], ["y"], *missing)?;
            Ok(Some(Arc::new(m) as MatrixRef<UoPair>))
        });

        let m = dispatcher
            .parse(&path, &UoPair::MISSING, &ParallelOptions::sequential())
            .unwrap();
        assert_eq!(m.row_keys().keys(), ["x"]);

        let log = dispatcher.last_log();
        let notes: Vec<&str> = log.for_label("always-fails").collect();
        assert_eq!(notes, ["not my format", "Format error: nope"]);
    }

    #[test]
    fn test_falls_through_to_dense_tab() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "m.tsv", "var\tc1\tc2\nr1\t1.5\tNaN\n");
        let dispatcher = FormatDispatcher::new(FloatCodec);
        let m = dispatcher
            .parse(&path, &f64::NAN, &ParallelOptions::new(2))
            .unwrap();
        assert_eq!(m.kind(), ViewKind::Dense);
        assert_eq!(m.get("r1", "c1").unwrap(), 1.5);
        assert!(!dispatcher.last_log().for_label("dense-struct").collect::<Vec<_>>().is_empty());
    }

    #[test]
    fn test_side_index_selects_row_keyed_store() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "m.txt", "var\tc1\tc2\nr1\tab??\n");
        let (_, index) = RowKeyIndex::build(&path, 2).unwrap();
        index.save(RowKeyIndex::side_path(&path)).unwrap();

        let m = FormatDispatcher::new(PairCodec)
            .parse(&path, &UoPair::MISSING, &ParallelOptions::sequential())
            .unwrap();
        assert_eq!(m.kind(), ViewKind::RowKeyedStruct);
    }

    #[test]
    fn test_exhaustion_reports_first_line_and_log() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "m.txt", "hello\tworld\nnothing here\n");
        let dispatcher = FormatDispatcher::new(PairCodec);

        assert!(dispatcher
            .try_parse(&path, &UoPair::MISSING, &ParallelOptions::sequential())
            .unwrap()
            .is_none());
        let err = dispatcher
            .parse(&path, &UoPair::MISSING, &ParallelOptions::sequential())
            .unwrap_err();
        match &err {
            MatrixError::Parse { first_line, log, .. } => {
                assert_eq!(first_line, "hello\tworld");
                assert!(log.contains("[dense-struct]"));
                assert!(log.contains("[dense-tab]"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_parse_error_carries_its_own_log_across_threads() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "first.txt", "junk\n");
        let second = write(&dir, "second.txt", "junk\n");
        let mut dispatcher = FormatDispatcher::new(PairCodec);
        dispatcher.register("named", |path, _, _, diagnostics| {
            diagnostics.note(format!("saw {}", path.display()));
            Ok(None)
        });

        std::thread::scope(|scope| {
            for (own, other) in [(&first, &second), (&second, &first)] {
                let dispatcher = &dispatcher;
                scope.spawn(move || {
                    for _ in 0..50 {
                        let err = dispatcher
                            .parse(own, &UoPair::MISSING, &ParallelOptions::sequential())
                            .unwrap_err();
                        let MatrixError::Parse { log, .. } = err else {
                            panic!("expected a parse error");
                        };
                        assert!(log.contains(&own.display().to_string()));
                        assert!(!log.contains(&other.display().to_string()));
                    }
                });
            }
        });

        let (found, log) = dispatcher
            .try_parse_logged(&first, &UoPair::MISSING, &ParallelOptions::sequential())
            .unwrap();
        assert!(found.is_none());
        assert_eq!(log.for_label("named").count(), 1);
    }

    #[test]
    fn test_incompatible_missing_value_skips_builtins() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "m.txt", "var\tc1\nr1\tab\n");
        let dispatcher = FormatDispatcher::new(PairCodec);
        let other = UoPair::new(b'n', b'n').unwrap();
        assert!(dispatcher
            .try_parse(&path, &other, &ParallelOptions::sequential())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dispatcher = FormatDispatcher::new(PairCodec);
        let err = dispatcher
            .try_parse("/nonexistent/m.txt", &UoPair::MISSING, &ParallelOptions::sequential())
            .unwrap_err();
        assert!(matches!(err, MatrixError::Io(_)));
    }
}
