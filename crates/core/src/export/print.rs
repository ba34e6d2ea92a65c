use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::{error::UnavailablePopupError, models::Card};

/// Cards on one printed sheet (3 rows × 3 columns).
pub const CARDS_PER_PAGE: usize = 9;

/// One printed sheet; trailing cells of the last sheet are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintPage {
    pub cells: Vec<Option<Card>>,
}

impl PrintPage {
    /// Rows of three cells, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<Card>]> {
        self.cells.chunks(3)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintLayout {
    pub pages: Vec<PrintPage>,
}

/// Outcome of [`build_print_layout`].
#[derive(Debug, Clone, PartialEq)]
pub enum PrintOutcome {
    /// Nothing selected; no preview should be opened.
    NothingToPrint,
    Ready(PrintLayout),
}

/// Lay `cards` out in sheets of nine, padding the last sheet.
pub fn build_print_layout(cards: &[Card]) -> PrintOutcome {
    if cards.is_empty() {
        return PrintOutcome::NothingToPrint;
    }
    let pages = cards
        .chunks(CARDS_PER_PAGE)
        .map(|chunk| {
            let mut cells: Vec<Option<Card>> = chunk.iter().cloned().map(Some).collect();
            cells.resize(CARDS_PER_PAGE, None);
            PrintPage { cells }
        })
        .collect();
    PrintOutcome::Ready(PrintLayout { pages })
}

impl PrintLayout {
    pub fn card_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.cells.iter())
            .filter(|cell| cell.is_some())
            .count()
    }

    /// Standalone HTML document, one A4 sheet per page.
    pub fn to_html(&self, title: &str, image_url: impl Fn(&Card) -> String) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"it\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n",
            escape(title)
        );
        for page in &self.pages {
            html.push_str("<section class=\"sheet\">\n");
            for cell in &page.cells {
                match cell {
                    Some(card) => {
                        let _ = writeln!(
                            html,
                            "<div class=\"cell\"><img src=\"{}\" alt=\"{}\"></div>",
                            escape(&image_url(card)),
                            escape(&card.name)
                        );
                    }
                    None => html.push_str("<div class=\"cell empty\"></div>\n"),
                }
            }
            html.push_str("</section>\n");
        }
        html.push_str("</body>\n</html>\n");
        html
    }

    /// Write the HTML document to `path`, creating parent directories.
    pub fn write_html(
        &self,
        path: &Path,
        title: &str,
        image_url: impl Fn(&Card) -> String,
    ) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_html(title, image_url))?;
        info!(path = %path.display(), pages = self.pages.len(), "print preview written");
        Ok(())
    }
}

const STYLE: &str = "@page{size:A4;margin:10mm}\
body{margin:0;background:#fff}\
.sheet{display:grid;grid-template-columns:repeat(3,63mm);grid-auto-rows:88mm;\
gap:2mm;justify-content:center;page-break-after:always;padding-top:8mm}\
.cell{border:0.2mm dashed #bbb;box-sizing:border-box}\
.cell img{width:100%;height:100%;object-fit:contain}\
.empty{border-color:transparent}";

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn opener(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(path);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(path);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    }
}

/// Ask the operating system to open the preview document.
pub fn open_preview(path: &Path) -> Result<(), UnavailablePopupError> {
    let unavailable = |message: String| UnavailablePopupError {
        path: PathBuf::from(path),
        message,
    };
    if !path.is_file() {
        return Err(unavailable("preview file does not exist".to_string()));
    }
    let mut command = opener(path);
    debug!(?command, "opening print preview");
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|child| {
            reap(child);
        })
        .map_err(|err| unavailable(err.to_string()))
}

/// Collect the opener's exit status on a background thread.
fn reap(mut child: Child) -> JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || match child.wait() {
        Ok(status) => {
            if !status.success() {
                warn!(%status, "preview opener exited with failure");
            }
            Some(status)
        }
        Err(err) => {
            warn!(error = %err, "failed to wait for preview opener");
            None
        }
    })
}
