use std::path::PathBuf;

use super::*;

fn real_table() -> CategoryTable {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/categories.yaml");
    load_category_table(&path).unwrap()
}

fn mapper() -> CategoryMapper {
    CategoryMapper::new(real_table())
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn real_table_loads_and_is_populated() {
    let table = real_table();
    for supplier in Supplier::ALL {
        assert!(
            table.dictionary_len(supplier) >= 20,
            "{supplier} dictionary too small"
        );
    }
    assert!(table.keyword_group_len() >= 30);
}

#[test]
fn exact_dictionary_hits_map_with_full_confidence() {
    let table = real_table();
    let mapper = CategoryMapper::new(table.clone());
    for supplier in Supplier::ALL {
        for entry in table.dictionary(supplier) {
            let verdict = mapper.map_category(supplier, &entry.pattern, None);
            assert_eq!(verdict.category, entry.category, "{supplier} {}", entry.pattern);
            assert_close(verdict.confidence, 1.0);
        }
    }
}

#[test]
fn domeme_fashion_category_maps_exactly() {
    let verdict = mapper().map_category(Supplier::Domeme, "여성패션잡화", None);
    assert_eq!(verdict.category, StandardCategory::FashionWomen);
    assert_close(verdict.confidence, 1.0);
}

#[test]
fn category_path_resolves_through_substring() {
    let verdict = mapper().map_category(Supplier::Ownerclan, "여성의류 > 원피스", None);
    assert_eq!(verdict.category, StandardCategory::FashionWomen);
    assert_close(verdict.confidence, 0.8);
}

#[test]
fn keyword_scan_uses_product_name() {
    // "스마트폰" and "케이스" hit two of the five mobile accessory
    // keywords: 2/5 * 1.2 = 0.48.
    let verdict = mapper().map_category(Supplier::Ownerclan, "unknown_xyz", Some("스마트폰 케이스"));
    assert_eq!(verdict.category, StandardCategory::MobileAccessories);
    assert_close(verdict.confidence, 0.48);
}

#[test]
fn keyword_scan_without_name_is_penalized() {
    // Jewelry keywords 귀걸이 + 반지: 2/5 * 1.2 = 0.48, then * 0.7.
    let verdict = mapper().map_category(Supplier::Ownerclan, "반지 귀걸이 모음", None);
    assert_eq!(verdict.category, StandardCategory::Jewelry);
    assert_close(verdict.confidence, 0.48 * 0.7);
}

#[test]
fn keyword_score_is_capped_at_one() {
    // All four books_media keywords present: 4/4 * 1.2 capped to 1.0.
    let verdict = mapper().map_category(Supplier::Gentrade, "도서 서적 음반 DVD", Some("도서 전집"));
    assert_eq!(verdict.category, StandardCategory::BooksMedia);
    assert_close(verdict.confidence, 1.0);
}

#[test]
fn unmapped_category_falls_back_to_other() {
    let verdict = mapper().map_category(Supplier::Domeme, "존재하지않는분류기호", None);
    assert_eq!(verdict.category, StandardCategory::Other);
    assert_close(verdict.confidence, 0.3);
}

#[test]
fn blank_category_short_circuits() {
    let mapper = mapper();
    for raw in ["", "   ", "\t"] {
        // The name would match keywords, but blank input never reaches
        // the keyword scan.
        let verdict = mapper.map_category(Supplier::Gentrade, raw, Some("스마트폰 케이스"));
        assert_eq!(verdict.category, StandardCategory::Other);
        assert_close(verdict.confidence, 0.0);
    }
}

#[test]
fn suggestions_rank_by_score() {
    let suggestions = mapper().suggest_categories("캠핑 텐트와 낚시 의자 세트", None);
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].category, StandardCategory::LeisureTravel);
    assert_close(suggestions[0].confidence, 0.72);
    assert_eq!(suggestions[1].category, StandardCategory::Furniture);
    assert_close(suggestions[1].confidence, 0.24);
}

#[test]
fn suggestions_tie_breaks_by_table_order() {
    // One hit in each of two five-keyword groups; the earlier group
    // (fashion accessories) must come first.
    let suggestions = mapper().suggest_categories("모자 운동화", None);
    assert_eq!(suggestions[0].category, StandardCategory::FashionAccessories);
    assert_eq!(suggestions[1].category, StandardCategory::Shoes);
    assert_close(suggestions[0].confidence, suggestions[1].confidence);
}

#[test]
fn suggestions_default_when_nothing_matches() {
    let suggestions = mapper().suggest_categories("plain english gadget", None);
    assert_eq!(
        suggestions,
        vec![CategoryMatch {
            category: StandardCategory::Other,
            confidence: 0.1
        }]
    );
}

#[test]
fn suggestions_include_description_text() {
    let none = mapper().suggest_categories("무제 상품", None);
    assert_eq!(none[0].category, StandardCategory::Other);

    let with_desc = mapper().suggest_categories("무제 상품", Some("강아지 사료 20kg"));
    assert_eq!(with_desc[0].category, StandardCategory::PetSupplies);
}

#[test]
fn duplicate_dictionary_entry_is_rejected() {
    let raw = r#"
suppliers:
  ownerclan:
    - match: "여성의류"
      category: fashion_women
    - match: "여성의류"
      category: fashion_men
  domeme: []
  gentrade: []
keyword_groups:
  - category: shoes
    keywords: ["운동화"]
"#;
    let err = parse_category_table(raw).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("여성의류")));
}

#[test]
fn empty_keyword_group_is_rejected() {
    let raw = r#"
suppliers:
  ownerclan: []
  domeme: []
  gentrade: []
keyword_groups:
  - category: shoes
    keywords: []
"#;
    let err = parse_category_table(raw).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("shoes")));
}

#[test]
fn blank_match_pattern_is_rejected() {
    let raw = r#"
suppliers:
  ownerclan:
    - match: "  "
      category: shoes
  domeme: []
  gentrade: []
keyword_groups: []
"#;
    let err = parse_category_table(raw).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn unknown_category_name_is_rejected() {
    let raw = r#"
suppliers:
  ownerclan:
    - match: "여성의류"
      category: not_a_category
  domeme: []
  gentrade: []
keyword_groups: []
"#;
    let err = parse_category_table(raw).unwrap_err();
    assert!(matches!(err, ConfigError::CategoryFileParse(_)));
}

#[test]
fn missing_file_reports_path() {
    let err = load_category_table(Path::new("/nonexistent/categories.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::CategoryFileIo { .. }));
}

#[test]
fn category_serde_form_matches_as_str() {
    for category in StandardCategory::ALL {
        let json = serde_json::to_value(category).unwrap();
        assert_eq!(
            json,
            serde_json::Value::String(category.as_str().to_string())
        );
    }
}
