//! Performance benchmarks
//!
//! - decoding and extracting a generated workbook
//! - extracting from an in-memory document model
//! - rendering items with both formatters

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_xlsxwriter::{Format, Formula, Shape, Workbook as XlsxWorkbook};
use std::io::Cursor;
use xlte::model::{CellValue, Drawing, ModernShape, Sheet, Workbook};
use xlte::{FileProcessor, OutputFormatter, WorkbookExtractor};

const ROWS: u32 = 2_000;
const COLS: u16 = 10;

/// Generates a workbook with strings, formatted numbers, formulas and text boxes.
fn generate_workbook() -> Vec<u8> {
    let mut workbook = XlsxWorkbook::new();
    let money = Format::new().set_num_format("#,##0.00");
    let date = Format::new().set_num_format("yyyy-mm-dd");

    for sheet_index in 0..3 {
        let worksheet = workbook.add_worksheet();
        for row in 0..ROWS {
            for col in 0..COLS {
                match col % 4 {
                    0 => worksheet.write_string(row, col, format!("Text {}-{}", row, col)),
                    1 => worksheet.write_number_with_format(row, col, row as f64 * 1.5, &money),
                    2 => worksheet.write_number_with_format(row, col, 45000.0 + row as f64, &date),
                    _ => worksheet.write_formula(
                        row,
                        col,
                        Formula::new(format!("=B{}*2", row + 1)).set_result((row as f64 * 3.0).to_string()),
                    ),
                }
                .expect("write cell");
            }
        }
        for i in 0..10 {
            let shape = Shape::textbox().set_text(format!("Sheet {} note {}", sheet_index, i));
            worksheet.insert_shape(i * 5, COLS + 1, &shape).expect("insert shape");
        }
    }

    workbook.save_to_buffer().expect("save workbook")
}

fn in_memory_workbook() -> Workbook {
    let sheets = (0..3)
        .map(|s| {
            let mut sheet = Sheet::new(format!("Sheet{}", s + 1));
            for row in 0..ROWS {
                sheet = sheet
                    .with_cell(row, 0, CellValue::String(format!("row {}", row)))
                    .with_cell(row, 1, CellValue::Number(row as f64 / 7.0))
                    .with_cell(row, 2, CellValue::Bool(row % 2 == 0))
                    .with_cell(
                        row,
                        3,
                        CellValue::formula("=B1*2", Some(CellValue::Number(row as f64))),
                    );
            }
            sheet.with_drawing(Drawing::Modern(
                (0..10).map(|i| ModernShape::simple(format!("note {}", i))).collect(),
            ))
        })
        .collect();
    Workbook::new(sheets)
}

fn benchmark_process_xlsx(c: &mut Criterion) {
    let data = generate_workbook();
    let processor = FileProcessor::new();

    let mut group = c.benchmark_group("process_xlsx");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);
    group.bench_function("generated_60k_cells", |b| {
        b.iter(|| {
            let items = processor
                .process_reader(Cursor::new(black_box(data.clone())), "bench.xlsx")
                .expect("process workbook");
            black_box(items)
        })
    });
    group.finish();
}

fn benchmark_extract_model(c: &mut Criterion) {
    let workbook = in_memory_workbook();

    let mut group = c.benchmark_group("extract_model");
    group.throughput(Throughput::Elements(3 * ROWS as u64 * 4));
    group.bench_function("workbook_extractor", |b| {
        b.iter(|| black_box(WorkbookExtractor.extract(black_box(&workbook), "bench.xlsx")))
    });
    group.finish();
}

fn benchmark_formatters(c: &mut Criterion) {
    let items = WorkbookExtractor.extract(&in_memory_workbook(), "bench.xlsx");

    let mut group = c.benchmark_group("format");
    group.throughput(Throughput::Elements(items.len() as u64));
    for formatter in [OutputFormatter::Terminal, OutputFormatter::Tsv] {
        group.bench_function(format!("{:?}", formatter), |b| {
            b.iter(|| black_box(formatter.format(black_box(&items))))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_process_xlsx,
    benchmark_extract_model,
    benchmark_formatters
);
criterion_main!(benches);
