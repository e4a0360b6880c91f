use std::io::{self, Write};

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};

use super::sample::{Health, Sample};

fn health_color(health: Health) -> Color {
    match health {
        Health::Ok => Color::Green,
        Health::Warning => Color::Yellow,
        Health::Critical => Color::Red,
    }
}

/// 바이트 크기를 사람이 읽기 쉬운 단위로
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes.max(0), UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// 연결 현황 표
pub fn connection_table(sample: &Sample) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["state", "connections"]);

    for (state, count) in &sample.connections {
        table.add_row(vec![Cell::new(state), Cell::new(count)]);
    }

    let health = sample.connection_health();
    table.add_row(vec![
        Cell::new("total / max"),
        Cell::new(format!(
            "{} / {} ({:.0}%)",
            sample.total_connections(),
            sample.max_connections,
            sample.connection_usage() * 100.0
        ))
        .fg(health_color(health)),
    ]);
    table
}

/// 테이블 통계 표
pub fn table_stats_table(sample: &Sample) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "table", "live", "dead", "dead %", "seq scan", "idx scan", "last vacuum", "status",
        ]);

    for stats in &sample.tables {
        let health = stats.health();
        let last_vacuum = stats
            .last_vacuum
            .map(|t| t.format("%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&stats.name),
            Cell::new(stats.live_tuples),
            Cell::new(stats.dead_tuples),
            Cell::new(format!("{:.1}", stats.dead_ratio() * 100.0)).fg(health_color(health)),
            Cell::new(stats.seq_scan),
            Cell::new(stats.idx_scan),
            Cell::new(last_vacuum),
            Cell::new(health.label()).fg(health_color(health)),
        ]);
    }
    table
}

/// 대시보드 전체 텍스트
pub fn dashboard(sample: &Sample, schema: &str) -> String {
    let overall = sample.overall_health();
    let status = match overall {
        Health::Ok => overall.label().green(),
        Health::Warning => overall.label().yellow(),
        Health::Critical => overall.label().red(),
    };

    format!(
        "{} {}  [{}]\nschema {} | db size {} | longest active query {:.1}s\n\n{}\n\n{}\n\nCtrl-C 로 종료",
        "review_system monitor".bold(),
        sample.taken_at.format("%Y-%m-%d %H:%M:%S UTC"),
        status,
        schema,
        format_bytes(sample.database_size),
        sample.longest_query_seconds,
        connection_table(sample),
        table_stats_table(sample),
    )
}

/// 화면을 지우고 대시보드 출력
pub fn draw(sample: &Sample, schema: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    writeln!(stdout, "{}", dashboard(sample, schema))?;
    stdout.flush()
}

/// --plain 모드용 한 줄 요약들
pub fn plain_lines(sample: &Sample) -> Vec<String> {
    let mut lines = Vec::with_capacity(1 + sample.tables.len());
    let states = sample
        .connections
        .iter()
        .map(|(state, count)| format!("{}={}", state, count))
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(format!(
        "[{}] connections {}/{} ({}) size={} longest_query={:.1}s",
        sample.connection_health().label(),
        sample.total_connections(),
        sample.max_connections,
        states,
        format_bytes(sample.database_size),
        sample.longest_query_seconds
    ));
    for stats in &sample.tables {
        lines.push(format!(
            "[{}] {} live={} dead={} ({:.1}%) seq={} idx={}",
            stats.health().label(),
            stats.name,
            stats.live_tuples,
            stats.dead_tuples,
            stats.dead_ratio() * 100.0,
            stats.seq_scan,
            stats.idx_scan
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::monitor::sample::TableStats;

    fn sample() -> Sample {
        Sample {
            taken_at: Utc::now(),
            connections: vec![("active".into(), 2), ("idle".into(), 1)],
            max_connections: 100,
            longest_query_seconds: 0.25,
            database_size: 3 * 1024 * 1024,
            tables: vec![TableStats {
                name: "reviews_partitioned_y2026m10".into(),
                live_tuples: 10,
                dead_tuples: 30,
                seq_scan: 1,
                idx_scan: 2,
                last_vacuum: None,
            }],
        }
    }

    #[test]
    fn bytes_are_scaled() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(-1), "0 B");
    }

    #[test]
    fn plain_lines_flag_unhealthy_tables() {
        let lines = plain_lines(&sample());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[OK] connections 3/100"));
        assert!(lines[0].contains("active=2 idle=1"));
        assert!(lines[1].starts_with("[CRIT] reviews_partitioned_y2026m10"));
        assert!(lines[1].contains("(75.0%)"));
    }

    #[test]
    fn dashboard_contains_tables() {
        let text = dashboard(&sample(), "review_system");
        assert!(text.contains("reviews_partitioned_y2026m10"));
        assert!(text.contains("3.0 MB"));
        assert!(text.contains("idle"));
    }
}
