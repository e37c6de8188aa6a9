//! End-to-end tests: bytes in, unredacted bytes out.

mod common;

use common::{PdfBuilder, first_page_content, read, secret_page};
use unredact_core::{ErrorKind, UnredactOptions, unredact, unredact_with_report};

const SQUARE_ANNOT: &str = "<< /Type /Annot /Subtype /Square /Rect [95 690 155 715] /AP << /N 7 0 R >> >>";
const SOLID_AP_DICT: &str = "/Type /XObject /Subtype /Form /BBox [0 0 60 25]";
const IMAGE_DICT: &str =
    "/Type /XObject /Subtype /Image /Width 1 /Height 1 /ColorSpace /DeviceGray /BitsPerComponent 8";

fn run(input: &[u8]) -> Vec<u8> {
    unredact(input, &UnredactOptions::default()).unwrap()
}

// === Scenarios ===

#[test]
fn test_simple_box_redaction() {
    let input = secret_page("0 0 0 rg 95 690 60 25 re f", "", "").build();
    let (output, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
    assert_eq!(report.content_ranges_removed, 2);

    let doc = read(&output);
    let content = first_page_content(&doc);
    assert!(content.starts_with("BT /F1 12 Tf 100 700 Td (SECRET) Tj ET\n"));
    assert!(!content.contains(" re"));
    assert!(content.trim_end().ends_with("0 0 0 rg"));
}

#[test]
fn test_annotation_overlay_removed() {
    let input = secret_page("", "/Annots [6 0 R]", "")
        .object(6, SQUARE_ANNOT)
        .stream(7, SOLID_AP_DICT, b"0 g 0 0 60 25 re f")
        .build();
    let (output, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
    assert_eq!(report.annotations_removed, 1);
    assert_eq!(report.content_ranges_removed, 0);

    let doc = read(&output);
    let page = doc.get(3).unwrap().as_dict().unwrap();
    assert!(!page.contains_key("Annots"));
    assert!(!doc.contains(6), "annotation object kept");
    assert!(!doc.contains(7), "appearance stream kept");
    // Content untouched
    assert!(doc.contains(4));
}

#[test]
fn test_annotation_with_text_appearance_kept() {
    let input = secret_page("", "/Annots [6 0 R]", "")
        .object(6, SQUARE_ANNOT)
        .stream(7, SOLID_AP_DICT, b"0 g 0 0 60 25 re f BT /F1 8 Tf 2 2 Td (Note) Tj ET")
        .build();
    let (_, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
    assert!(report.is_unchanged());
}

#[test]
fn test_encrypted_input_rejected() {
    let input = secret_page("0 g 95 690 60 25 re f", "", "")
        .object(8, "<< /Filter /Standard /V 2 /R 3 >>")
        .trailer("/Encrypt 8 0 R")
        .build();
    let err = unredact(&input, &UnredactOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncryptedDocument);
}

#[test]
fn test_missing_startxref_is_malformed() {
    let input = secret_page("", "", "").without_startxref().build();
    let err = unredact(&input, &UnredactOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedContainer);
}

// === Properties ===

#[test]
fn test_second_pass_is_byte_identical() {
    let input = secret_page("0 g 95 690 60 25 re f", "/Annots [6 0 R]", "")
        .object(6, SQUARE_ANNOT)
        .stream(7, SOLID_AP_DICT, b"0 g 0 0 60 25 re f")
        .build();
    let first = run(&input);
    let second = run(&first);
    assert_eq!(first, second);
}

#[test]
fn test_second_pass_identical_with_indirect_length() {
    let image = format!("<< {IMAGE_DICT} /Length 9 0 R >>\nstream\n\x00\nendstream");
    let input = secret_page("0 g 95 690 60 25 re f", "", "/XObject << /Im1 8 0 R >>")
        .object(8, &image)
        .object(9, "1")
        .build();
    let first = run(&input);
    let doc = read(&first);
    assert!(!doc.contains(9));
    assert_eq!(doc.get(8).unwrap().as_stream().unwrap().get_rawdata(), b"\x00");
    assert_eq!(run(&first), first);
}

#[test]
fn test_uncovered_text_keeps_its_bytes() {
    let input = secret_page("BT /F1 12 Tf 300 300 Td (PUBLIC) Tj ET 0 g 95 690 60 25 re f", "", "").build();
    let content = first_page_content(&read(&run(&input)));
    assert!(content.starts_with(
        "BT /F1 12 Tf 100 700 Td (SECRET) Tj ET\nBT /F1 12 Tf 300 300 Td (PUBLIC) Tj ET 0 g "
    ));
}

#[test]
fn test_output_references_resolve() {
    let input = secret_page("q 60 0 0 25 95 690 cm /Im1 Do Q", "/Annots [6 0 R]", "/XObject << /Im1 8 0 R >>")
        .object(6, SQUARE_ANNOT)
        .stream(7, SOLID_AP_DICT, b"0 g 0 0 60 25 re f")
        .stream(8, IMAGE_DICT, b"\x00")
        .build();
    let doc = read(&run(&input));
    for (r, obj) in doc.iter() {
        obj.for_each_ref(&mut |target| {
            assert!(doc.contains(target.objid), "{r} refers to missing {target}");
        });
    }
}

#[test]
fn test_image_only_used_by_removed_do_is_gone() {
    let input = secret_page("q 60 0 0 25 95 690 cm /Im1 Do Q", "", "/XObject << /Im1 8 0 R >>")
        .stream(8, IMAGE_DICT, b"\x00")
        .build();
    let (output, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
    assert_eq!(report.content_ranges_removed, 1);

    let doc = read(&output);
    assert!(!doc.contains(8));
    assert!(!first_page_content(&doc).contains("Do"));
}

#[test]
fn test_decorative_border_kept() {
    let overlay = "0 g 0 0 612 4 re f 0 788 612 4 re f";
    let input = secret_page(overlay, "", "").build();
    let (output, report) = unredact_with_report(&input, &UnredactOptions::default()).unwrap();
    assert!(report.is_unchanged());

    let before = read(&input);
    let after = read(&output);
    assert_eq!(
        before.get(4).unwrap().as_stream().unwrap().get_rawdata(),
        after.get(4).unwrap().as_stream().unwrap().get_rawdata()
    );
}

#[test]
fn test_text_inside_form_counts_as_covered() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << /XObject << /Fm1 5 0 R >> >> >>",
        )
        .stream(4, "", b"/Fm1 Do 0 g 95 690 60 25 re f")
        .stream(
            5,
            "/Type /XObject /Subtype /Form /BBox [0 0 612 792]",
            b"BT /F1 12 Tf 100 700 Td (SECRET) Tj ET",
        )
        .build();
    let content = first_page_content(&read(&run(&input)));
    assert!(content.starts_with("/Fm1 Do 0 g"));
    assert!(!content.contains("re"));
}

// === Errors ===

#[test]
fn test_unbalanced_restore_is_content_error() {
    let input = secret_page("q Q Q", "", "").build();
    let err = unredact(&input, &UnredactOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedContentStream);
}

#[test]
fn test_page_tree_cycle_is_rejected() {
    let input = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>")
        .build();
    let err = unredact(&input, &UnredactOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedPageTree);
}

#[test]
fn test_object_limit() {
    let input = secret_page("", "", "").build();
    let options = UnredactOptions {
        max_objects: 3,
        ..Default::default()
    };
    let err = unredact(&input, &options).unwrap_err();
    assert!(err.kind().is_resource_limit());
}

#[test]
fn test_form_fan_out_is_bounded() {
    // Nine form levels, each invoking the next twelve times
    let mut builder = secret_page("/X Do", "", "/XObject << /X 6 0 R >>");
    let calls = "/X Do ".repeat(12);
    for id in 6..15 {
        builder = builder.stream(
            id,
            &format!("/Type /XObject /Subtype /Form /BBox [0 0 612 792] /Resources << /XObject << /X {} 0 R >> >>", id + 1),
            calls.as_bytes(),
        );
    }
    let input = builder
        .stream(15, "/Type /XObject /Subtype /Form /BBox [0 0 612 792]", b"0 g 0 0 1 1 re f")
        .build();
    let options = UnredactOptions {
        max_operators: 20_000,
        ..Default::default()
    };
    let err = unredact(&input, &options).unwrap_err();
    assert!(err.kind().is_resource_limit());
}

#[test]
fn test_newer_version_unsupported() {
    let input = secret_page("", "", "").version("2.1").build();
    let err = unredact(&input, &UnredactOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}
