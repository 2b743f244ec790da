//! Final document assembly.
//!
//! Every run produces one self-contained HTML file: A4 print styles, the
//! page fragments in order, and a small script that lets the reader click a
//! blank figure box and drop the original diagram into it. The file has no
//! external references, so it can be opened offline and printed to PDF
//! directly.

use crate::output::PageFragment;

/// Print styles shared by every reconstructed page.
///
/// Each `.page-container` is a fixed A4 sheet with tight padding. English
/// text runs longer than the Chinese source, so the base type size is kept
/// small enough that a full page does not overflow the bottom edge.
pub const SHARED_CSS: &str = r#"
@page { size: A4; margin: 0; }
body { margin: 0; padding: 0; background: #f0f0f0; font-family: 'Arial', 'Helvetica Neue', sans-serif; -webkit-print-color-adjust: exact; }

.page-container {
    width: 210mm;
    height: 297mm;
    padding: 3mm 10mm 12mm 10mm;
    margin: 40px auto;
    background: white;
    overflow: hidden;
    position: relative;
    box-shadow: 0 4px 15px rgba(0,0,0,0.1);
    box-sizing: border-box;
    font-size: 9.5pt;
    line-height: 1.25;
    color: #333;
    page-break-after: always;
}

.page-container:last-child { margin-bottom: 40px; page-break-after: auto; }

@media print {
    body { background: white; }
    .page-container {
        margin: 0;
        box-shadow: none;
        width: 210mm;
        height: 297mm;
        overflow: hidden;
        border: none;
    }
}

.main-title {
    font-weight: bold;
    margin-top: 0;
    margin-bottom: 6px;
    line-height: 1.1;
    font-size: 14pt;
    color: #000;
}

.section-header {
    display: flex;
    align-items: baseline;
    border-bottom: 1px solid #ccc;
    padding-bottom: 3px;
    margin-top: 10px;
    margin-bottom: 6px;
    font-size: 12pt;
    font-weight: bold;
    color: #000;
}
.section-number {
    margin-right: 8px;
    font-size: 1.3em;
}

.warning-box {
    background-color: #f9f9f9;
    border: 1px solid #ddd;
    padding: 6px 8px;
    margin-bottom: 8px;
    border-radius: 4px;
    page-break-inside: avoid;
}

.warning-title {
    font-weight: bold;
    display: flex;
    align-items: center;
    gap: 5px;
    margin-bottom: 3px;
    font-size: 10pt;
    color: #000;
}

.icon-triangle {
    display: inline-flex;
    align-items: center;
    justify-content: center;
    width: 14px;
    height: 14px;
    font-size: 12px;
}

ul { margin: 0; padding-left: 16px; }
li { margin-bottom: 2px; text-align: justify; }
p { margin-bottom: 5px; text-align: justify; }

/* height comes from the inline style the model writes per figure */
.figure-box {
    width: 100%;
    min-height: 10mm;
    border: 1px dashed #ccc;
    background-color: #fafafa;
    display: flex;
    flex-direction: column;
    align-items: center;
    justify-content: center;
    text-align: center;
    padding: 0;
    box-sizing: border-box;
    margin: 8px 0;
    cursor: pointer;
    transition: all 0.2s;
    page-break-inside: avoid;
    overflow: hidden;
}
.figure-box:hover { background-color: #f0f0f0; }
.figure-label {
    font-weight: bold;
    margin: 4px 0 2px 0;
    font-size: 8.5pt;
    pointer-events: none;
}
.figure-hint {
    font-size: 7.5pt;
    color: #999;
    margin-bottom: 4px;
    pointer-events: none;
}

.page-footer {
    position: absolute;
    bottom: 5mm;
    left: 10mm;
    right: 10mm;
    display: flex;
    justify-content: center;
    align-items: center;
    font-size: 9pt;
    color: #000;
    z-index: 50;
    height: 5mm;
}

.page-number-box {
    font-weight: bold;
    padding: 0 5px;
    display: inline-block;
}

.bold { font-weight: bold; }
"#;

/// Click-to-replace handler for `.figure-box` placeholders.
///
/// A hidden file input is shared by all boxes. The chosen image is read as a
/// data URL, so the saved HTML stays self-contained.
pub const SHARED_SCRIPT: &str = r#"<script>
(function() {
  document.addEventListener('DOMContentLoaded', () => {
    const fileInput = document.createElement('input');
    fileInput.type = 'file';
    fileInput.accept = 'image/*';
    fileInput.style.display = 'none';
    document.body.appendChild(fileInput);

    let currentBox = null;

    document.body.addEventListener('click', (e) => {
      const box = e.target.closest('.figure-box');
      if (box) {
        currentBox = box;
        fileInput.click();
      }
    });

    fileInput.addEventListener('change', (e) => {
      const file = e.target.files[0];
      if (file && currentBox) {
        const reader = new FileReader();
        reader.onload = (event) => {
          currentBox.innerHTML = '';
          const img = document.createElement('img');
          img.src = event.target.result;
          img.style.width = '100%';
          img.style.height = '100%';
          img.style.objectFit = 'contain';
          currentBox.appendChild(img);
          currentBox.style.border = 'none';
          currentBox.style.background = 'transparent';
        };
        reader.readAsDataURL(file);
      }
      fileInput.value = '';
    });
  });
})();
</script>"#;

/// Markup standing in for a page whose reconstruction failed.
///
/// It is a full A4 page-container, so the pages after it keep their
/// position when the document is printed.
pub fn error_placeholder(page_num: u32) -> String {
    format!(
        "<div class=\"page-container\" style=\"display:flex;align-items:center;justify-content:center;color:red;flex-direction:column;\">\n  \
         <h2>\u{26a0}\u{fe0f} Page {page_num} Reconstruction Failed</h2>\n\
         </div>"
    )
}

/// Wrap page fragments into the final HTML document.
///
/// Fragments appear in the order given, separated by a blank line. The
/// result is trimmed.
pub fn assemble_document(fragments: &[PageFragment]) -> String {
    assemble_markup(fragments.iter().map(|f| f.html.as_str()))
}

/// Same as [`assemble_document`] for bare markup strings.
pub fn assemble_markup<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let body = fragments.into_iter().collect::<Vec<_>>().join("\n\n");

    let html = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"UTF-8\">\n\
         <style>\n{SHARED_CSS}\n</style>\n\
         </head>\n\
         <body>\n\
         {body}\n\
         {SHARED_SCRIPT}\n\
         </body>\n\
         </html>\n"
    );
    html.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;

    #[test]
    fn placeholder_names_the_page() {
        let html = error_placeholder(7);
        assert!(html.starts_with("<div class=\"page-container\""));
        assert!(html.contains("Page 7 Reconstruction Failed"));
        assert!(html.contains("color:red"));
        assert!(html.ends_with("</div>"));
    }

    #[test]
    fn document_shell() {
        let doc = assemble_markup(["<div class=\"page-container\">A</div>"]);
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.ends_with("</html>"));
        assert!(doc.contains("<html lang=\"en\">"));
        assert!(doc.contains("<meta charset=\"UTF-8\">"));
        assert!(doc.contains("size: A4"));
        assert!(doc.contains("FileReader"));
    }

    #[test]
    fn fragments_keep_order_and_blank_line_separator() {
        let doc = assemble_markup(["<p>one</p>", "<p>two</p>", "<p>three</p>"]);
        assert!(doc.contains("<p>one</p>\n\n<p>two</p>\n\n<p>three</p>"));
        let script_at = doc.find("<script>").unwrap();
        assert!(doc.find("<p>three</p>").unwrap() < script_at);
    }

    #[test]
    fn assemble_document_uses_fragment_markup() {
        let pages = vec![
            PageFragment::success(1, "<div class=\"page-container\">ok</div>".into(), 0, 0, 0, 0),
            PageFragment::failed(
                2,
                PageError::Timeout { page: 2, secs: 1 },
                0,
            ),
        ];
        let doc = assemble_document(&pages);
        assert!(doc.contains("<div class=\"page-container\">ok</div>\n\n<div class=\"page-container\" style="));
        assert!(doc.contains("Page 2 Reconstruction Failed"));
    }

    #[test]
    fn empty_document_is_still_valid_shell() {
        let doc = assemble_markup(std::iter::empty());
        assert!(doc.contains("<body>"));
        assert!(doc.contains("</body>"));
    }
}
