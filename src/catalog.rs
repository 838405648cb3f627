use std::path::Path;

use walkdir::WalkDir;

use crate::model::{CourseLedger, VideoId, VideoRecord};

/// Scans `<base_dir>/<course>` recursively for `.mp4` files and builds an
/// unwatched ledger ordered by lesson number.
///
/// The title is the file stem and the id a stable slug of it, so repeated
/// scans of the same directory produce the same ids. Lesson order is the
/// first integer found in the title ("lesson2" sorts before "lesson10");
/// titles without a number keep their walk order at the front.
pub fn scan_course(base_dir: &Path, course: &str) -> CourseLedger {
    let course_dir = base_dir.join(course);

    let mut records: CourseLedger = WalkDir::new(&course_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
        })
        .filter_map(|entry| {
            let title = entry.path().file_stem()?.to_str()?.to_owned();
            let video_url = entry
                .path()
                .strip_prefix(base_dir)
                .ok()?
                .to_str()?
                .to_owned();
            Some(VideoRecord::unwatched(
                VideoId::new(slug(&title)),
                Some(title),
                Some(video_url),
            ))
        })
        .collect();

    // stable sort keeps walk order for equal lesson numbers
    records.sort_by_key(|record| {
        record
            .title
            .as_deref()
            .map(lesson_number)
            .unwrap_or_default()
    });

    tracing::info!(course, videos = records.len(), "scanned course directory");
    records
}

/// First run of digits in the title, or 0.
fn lesson_number(title: &str) -> u32 {
    title
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn lesson_numbers_sort_numerically() {
        assert_eq!(lesson_number("lesson2"), 2);
        assert_eq!(lesson_number("lesson10"), 10);
        assert_eq!(lesson_number("13 - closing remarks"), 13);
        assert_eq!(lesson_number("intro"), 0);
    }

    #[test]
    fn slugs_are_stable_and_filesystem_safe() {
        assert_eq!(slug("Lesson 2 – Ownership"), "lesson-2---ownership");
        assert_eq!(slug("intro"), "intro");
    }

    #[test]
    fn scan_finds_videos_in_lesson_order() {
        let dir = tempfile::tempdir().unwrap();
        let course_dir = dir.path().join("rust-bootcamp");
        fs::create_dir_all(course_dir.join("section2")).unwrap();

        fs::write(course_dir.join("lesson10.mp4"), b"").unwrap();
        fs::write(course_dir.join("lesson2.MP4"), b"").unwrap();
        fs::write(course_dir.join("section2").join("lesson1.mp4"), b"").unwrap();
        fs::write(course_dir.join("notes.txt"), b"").unwrap();

        let ledger = scan_course(dir.path(), "rust-bootcamp");

        let titles: Vec<_> = ledger
            .iter()
            .map(|record| record.title.as_deref().unwrap().to_owned())
            .collect();
        assert_eq!(titles, ["lesson1", "lesson2", "lesson10"]);

        assert!(ledger.iter().all(|record| !record.watched));
        assert!(ledger.iter().all(|record| record.watched_at.is_none()));
        assert_eq!(
            ledger[0].video_url.as_deref(),
            Some("rust-bootcamp/section2/lesson1.mp4")
        );
    }

    #[test]
    fn scan_of_a_missing_course_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_course(dir.path(), "ghost-course").is_empty());
    }
}
