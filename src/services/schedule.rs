// src/services/schedule.rs

//! HTML schedule decoder.
//!
//! The schedule page is one table. After the header row, every row whose
//! first cell reads like `2.9.2024(Пн)` is a day; its remaining cells are
//! lesson slots. A slot either holds one lesson directly or, when it carries
//! the merged-cell class, a nested table of concurrent sub-lessons (split lab
//! groups and the like).
//!
//! Lessons are collected per date without duplicates (all five fields
//! compared) and sorted by slot id.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Schedule, ScheduleRecord};

/// Class marking a cell that holds several sub-lessons.
pub const MERGED_CELL_CLASS: &str = "asd";

/// Attribute carrying the lesson slot id.
pub const SLOT_ID_ATTR: &str = "pare_id";

const DATE_PATTERN: &str = r"^(?P<numeric>\d+\.\d+\.\d+)\((?P<weekday>\w+)\)";

/// How a lesson cell is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellLayout {
    /// Plain lesson cell; every field but the name is optional.
    Normal,
    /// Sub-cell of a merged cell; the discipline type is mandatory.
    Merged,
}

/// Decoder for the HTML schedule protocol.
pub struct ScheduleDecoder {
    date_re: Regex,
    row: Selector,
    cell: Selector,
    title: Selector,
    lesson_type: Selector,
    auditorium: Selector,
    teacher: Selector,
}

impl ScheduleDecoder {
    /// Compile the selectors and the date pattern.
    pub fn new() -> Result<Self> {
        Ok(Self {
            date_re: Regex::new(DATE_PATTERN)?,
            row: parse_selector("tr")?,
            cell: parse_selector("td")?,
            title: parse_selector("span")?,
            lesson_type: parse_selector(".lestype")?,
            auditorium: parse_selector(".aud")?,
            teacher: parse_selector(".p")?,
        })
    }

    /// Decode a schedule page.
    ///
    /// Rows without a leading date are skipped. A lesson cell missing its
    /// title or slot id fails the whole page: a schedule with silently
    /// dropped lessons is worse than none.
    pub fn decode(&self, html: &str) -> Result<Schedule> {
        let document = Html::parse_document(html);
        let mut schedule = Schedule::new();

        for row in document.select(&self.row).skip(1) {
            let mut cells = direct_cells(row);

            let Some(date_cell) = cells.next() else {
                continue;
            };
            let Some(date) = self.date_key(&date_cell) else {
                log::debug!("Skipping non-date row: {}", text_of(&date_cell));
                continue;
            };

            // A day with no lessons still shows up with an empty list.
            schedule.day_mut(&date);

            for cell in cells {
                if is_blank(&cell) {
                    continue;
                }

                if has_class(&cell, MERGED_CELL_CLASS) {
                    for sub_cell in cell.select(&self.cell) {
                        if is_blank(&sub_cell) {
                            continue;
                        }
                        let record = self.parse_record(&sub_cell, CellLayout::Merged, &date)?;
                        schedule.insert(&date, record);
                    }
                } else {
                    let record = self.parse_record(&cell, CellLayout::Normal, &date)?;
                    schedule.insert(&date, record);
                }
            }
        }

        schedule.sort_records();
        log::debug!(
            "Decoded schedule: {} days, {} records",
            schedule.len(),
            schedule.record_count()
        );
        Ok(schedule)
    }

    /// Extract the numeric date from a `D.M.YYYY(weekday)` cell.
    fn date_key(&self, cell: &ElementRef) -> Option<String> {
        let text = text_of(cell);
        self.date_re
            .captures(&text)
            .and_then(|caps| caps.name("numeric"))
            .map(|m| m.as_str().to_string())
    }

    fn parse_record(
        &self,
        cell: &ElementRef,
        layout: CellLayout,
        date: &str,
    ) -> Result<ScheduleRecord> {
        let context = || format!("schedule cell on {date}");

        let name = cell
            .select(&self.title)
            .next()
            .and_then(|span| span.value().attr("title"))
            .ok_or_else(|| AppError::decode(context(), "missing lesson title"))?
            .trim()
            .to_string();

        let discipline_type = self.first_text(cell, &self.lesson_type);
        if layout == CellLayout::Merged && discipline_type.is_none() {
            return Err(AppError::decode(context(), "merged cell without lesson type"));
        }

        let raw_id = cell
            .value()
            .attr(SLOT_ID_ATTR)
            .ok_or_else(|| AppError::decode(context(), format!("missing {SLOT_ID_ATTR}")))?;
        let id = raw_id.trim().parse::<i64>().map_err(|_| {
            AppError::decode(context(), format!("invalid {SLOT_ID_ATTR} '{raw_id}'"))
        })?;

        Ok(ScheduleRecord {
            id,
            name,
            auditorium: self.first_text(cell, &self.auditorium),
            discipline_type,
            teacher_name: self.first_text(cell, &self.teacher),
        })
    }

    fn first_text(&self, cell: &ElementRef, selector: &Selector) -> Option<String> {
        cell.select(selector).next().map(|el| text_of(&el))
    }
}

/// `td` children of a row, ignoring cells of nested tables.
fn direct_cells<'a>(row: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn is_blank(element: &ElementRef) -> bool {
    element.text().all(|t| t.trim().is_empty())
}

fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
