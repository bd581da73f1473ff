use crate::dto::report_dto::TestReportRow;
use crate::error::Result;
use crate::models::test::TestDefinition;
use crate::services::report_service::PASS_MARK;
use rust_xlsxwriter::*;

pub struct ExportService;

impl ExportService {
    /// Per-student result sheet for one test.
    pub fn generate_test_report_xlsx(test: &TestDefinition, rows: &[TestReportRow]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Results")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let border_color = Color::RGB(0xE2E8F0);
        let alt_row = Color::RGB(0xF8FAFC);
        let pass_color = Color::RGB(0x10B981);
        let fail_color = Color::RGB(0xEF4444);
        let muted_color = Color::RGB(0x64748B);

        let columns = [
            ("#", 6.0),
            ("Student", 28.0),
            ("College", 28.0),
            ("Branch", 14.0),
            ("Batch", 10.0),
            ("Section", 10.0),
            ("Marks", 10.0),
            ("Total", 10.0),
            ("Percentage", 12.0),
            ("Result", 12.0),
            ("Submitted At", 22.0),
        ];
        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }
        let last_col = (columns.len() - 1) as u16;

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(primary_color)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 36)?;
        worksheet.merge_range(0, 0, 0, last_col, &test.name, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::Center);
        let submitted = rows.iter().filter(|r| r.submitted_at.is_some()).count();
        let subtitle = format!(
            "{} | {} | window {} to {} | {} of {} submitted",
            test.subject,
            test.test_type,
            test.start_at.format("%d.%m.%Y %H:%M UTC"),
            test.end_at.format("%d.%m.%Y %H:%M UTC"),
            submitted,
            rows.len()
        );
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        for (idx, report) in rows.iter().enumerate() {
            let row = header_row + 1 + idx as u32;
            let bg = if idx % 2 == 0 { alt_row } else { Color::White };
            let base = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center = base.clone().set_align(FormatAlign::Center);

            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center)?;
            worksheet.write_string_with_format(row, 1, &report.student_name, &base.clone().set_bold())?;
            worksheet.write_string_with_format(row, 2, &report.college_name, &base)?;
            worksheet.write_string_with_format(row, 3, &report.branch, &center)?;
            worksheet.write_string_with_format(row, 4, &report.batch, &center)?;
            worksheet.write_string_with_format(row, 5, &report.section, &center)?;
            worksheet.write_number_with_format(row, 7, report.total_marks as f64, &center)?;

            match (report.marks_obtained, report.percentage) {
                (Some(marks), Some(pct)) => {
                    worksheet.write_number_with_format(row, 6, marks as f64, &center)?;
                    worksheet.write_number_with_format(row, 8, pct, &center)?;
                    let (label, color) = if pct >= PASS_MARK {
                        ("Pass", pass_color)
                    } else {
                        ("Fail", fail_color)
                    };
                    let result_fmt = center.clone().set_bold().set_font_color(color);
                    worksheet.write_string_with_format(row, 9, label, &result_fmt)?;
                }
                _ => {
                    let muted = center.clone().set_font_color(muted_color);
                    worksheet.write_string_with_format(row, 6, "-", &muted)?;
                    worksheet.write_string_with_format(row, 8, "-", &muted)?;
                    worksheet.write_string_with_format(row, 9, "Not attempted", &muted)?;
                }
            }

            let submitted_at = report
                .submitted_at
                .map(|t| t.format("%d.%m.%Y %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            worksheet.write_string_with_format(row, 10, &submitted_at, &center)?;
        }

        worksheet.set_freeze_panes(header_row + 1, 0)?;

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}
