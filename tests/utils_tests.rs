use asset_relations_explorer::describe::{format_bytes, to_fixed_string};
use asset_relations_explorer::utils::table::render;

#[test]
fn table_pads_to_widest_cell() {
    let rows = vec![
        vec!["Assets/A.png".to_string(), "yes".to_string()],
        vec!["B".to_string()],
    ];
    let out = render(&["Asset", "Included"], &rows);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "+--------------+----------+");
    assert_eq!(lines[1], "| Asset        | Included |");
    assert_eq!(lines[3], "| Assets/A.png | yes      |");
    assert_eq!(lines[4], "| B            |          |");
    assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
}

#[test]
fn table_counts_characters_not_bytes() {
    let rows = vec![vec!["Größe".to_string()]];
    let out = render(&["x"], &rows);
    assert!(out.contains("| Größe |"));
}

#[test]
fn number_formatting_helpers() {
    assert_eq!(format_bytes(512), "512 B");
    assert_eq!(to_fixed_string(90.50967, 5), "90.510");
}
