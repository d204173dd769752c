#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int8Array, Int16Array, Int32Array, Int64Array, ListArray, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Int32Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::{WriterProperties, WriterVersion};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes `batch` as a Parquet file under the workspace and returns the path.
    pub fn write_parquet(&self, name: &str, batch: &RecordBatch) -> PathBuf {
        self.write_parquet_with(name, batch, None)
    }

    pub fn write_parquet_with(
        &self,
        name: &str,
        batch: &RecordBatch,
        props: Option<WriterProperties>,
    ) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let file = File::create(&path).expect("create parquet file");
        let mut writer =
            ArrowWriter::try_new(file, batch.schema(), props).expect("parquet writer");
        writer.write(batch).expect("write batch");
        writer.close().expect("close parquet writer");
        path
    }

    /// Same as [`Self::write_parquet`] but stamped with format version 2.
    pub fn write_parquet_v2(&self, name: &str, batch: &RecordBatch) -> PathBuf {
        let props = WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .build();
        self.write_parquet_with(name, batch, Some(props))
    }
}

/// Rows with an `id` column counting up from zero.
pub fn id_batch(rows: i64) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from_iter_values(0..rows))])
        .expect("id batch")
}

/// Five rows covering every scannable type plus a list column.
pub fn typed_batch() -> RecordBatch {
    let tags_field = Field::new_list_field(DataType::Int32, true);
    let schema = Arc::new(Schema::new(vec![
        Field::new("flag", DataType::Boolean, true),
        Field::new("tiny", DataType::Int8, true),
        Field::new("small", DataType::Int16, true),
        Field::new("id", DataType::Int32, false),
        Field::new("big", DataType::Int64, true),
        Field::new("ratio", DataType::Float32, true),
        Field::new("score", DataType::Float64, true),
        Field::new("price", DataType::Decimal128(10, 2), true),
        Field::new("wide", DataType::Decimal128(30, 4), true),
        Field::new("name", DataType::Utf8, true),
        Field::new("blob", DataType::Binary, true),
        Field::new("born", DataType::Date32, true),
        Field::new(
            "seen",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            true,
        ),
        Field::new("tags", DataType::List(Arc::new(tags_field)), true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(BooleanArray::from(vec![
            Some(true),
            Some(false),
            None,
            Some(true),
            Some(false),
        ])),
        Arc::new(Int8Array::from(vec![Some(-8), Some(0), Some(8), None, Some(127)])),
        Arc::new(Int16Array::from(vec![Some(-300), Some(0), Some(300), Some(1), None])),
        Arc::new(Int32Array::from(vec![1, 2, 3, 4, 5])),
        Arc::new(Int64Array::from(vec![
            Some(i64::MIN),
            Some(0),
            Some(i64::MAX),
            None,
            Some(42),
        ])),
        Arc::new(Float32Array::from(vec![Some(0.5), Some(-1.25), None, Some(2.0), Some(0.0)])),
        Arc::new(Float64Array::from(vec![
            Some(1.5),
            Some(-2.75),
            Some(1e10),
            None,
            Some(0.0),
        ])),
        Arc::new(
            Decimal128Array::from(vec![Some(123_456), Some(-5), Some(0), None, Some(99)])
                .with_precision_and_scale(10, 2)
                .expect("decimal(10,2)"),
        ),
        Arc::new(
            Decimal128Array::from(vec![
                Some(123_456_789_012_345_678_901_234_i128),
                Some(-1),
                None,
                Some(10_000),
                Some(0),
            ])
            .with_precision_and_scale(30, 4)
            .expect("decimal(30,4)"),
        ),
        Arc::new(StringArray::from(vec![
            Some("alpha"),
            Some(""),
            None,
            Some("déjà vu"),
            Some("omega"),
        ])),
        Arc::new(BinaryArray::from(vec![
            Some(&[0xde_u8, 0xad][..]),
            Some(&[][..]),
            None,
            Some(&[0x00_u8][..]),
            Some(&[0xff_u8][..]),
        ])),
        Arc::new(Date32Array::from(vec![
            Some(0),
            Some(10_957),
            Some(-1),
            None,
            Some(19_723),
        ])),
        Arc::new(
            TimestampMicrosecondArray::from(vec![
                Some(0),
                Some(946_684_800_000_000),
                Some(-1),
                None,
                Some(1_700_000_000_123_456),
            ])
            .with_timezone("UTC"),
        ),
        Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
            Some(vec![]),
            Some(vec![Some(3)]),
            Some(vec![None]),
        ])),
    ];
    RecordBatch::try_new(schema, columns).expect("typed batch")
}
