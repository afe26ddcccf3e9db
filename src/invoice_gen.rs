use anyhow::{Result, anyhow};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use rust_decimal::Decimal;

use crate::models::{Client, Invoice, InvoiceItem, User};

/// Everything a rendered invoice document draws on: the invoice and its
/// items, the billed client, the issuing account and the host the request
/// came in on (used as the document's base URL).
pub struct RenderContext<'a> {
    pub invoice: &'a Invoice,
    pub items: &'a [InvoiceItem],
    pub client: &'a Client,
    pub user: &'a User,
    pub host: &'a str,
}

/// Turns document markup into final bytes. The default implementation
/// produces PDF; tests substitute their own.
pub trait DocumentRenderer {
    fn render(&self, markup: &str, base_url: &str) -> Result<Vec<u8>>;
}

/// Service for rendering invoices to downloadable PDF documents
pub struct InvoiceGenerator {
    renderer: Box<dyn DocumentRenderer + Send + Sync>,
}

impl InvoiceGenerator {
    pub fn new() -> Self {
        Self {
            renderer: Box::new(PdfRenderer),
        }
    }

    pub fn with_renderer(renderer: Box<dyn DocumentRenderer + Send + Sync>) -> Self {
        Self { renderer }
    }

    /// Render the invoice to markup and hand it to the document renderer.
    pub fn generate(&self, ctx: &RenderContext<'_>) -> Result<Vec<u8>> {
        let markup = self.generate_markup(ctx);
        let base_url = format!("http://{}", ctx.host);

        self.renderer.render(&markup, &base_url)
    }

    /// Generate markup content for the invoice
    fn generate_markup(&self, ctx: &RenderContext<'_>) -> String {
        let mut content = String::new();

        // Issuer header (company, address, phone)
        let issuer = if ctx.user.company.is_empty() {
            format!("{} {}", ctx.user.first_name, ctx.user.last_name)
        } else {
            ctx.user.company.clone()
        };
        content.push_str(&format!("# {}\n", issuer));

        for line in [
            &ctx.user.address1,
            &ctx.user.address2,
            &ctx.user.country,
            &ctx.user.phone,
        ] {
            if !line.is_empty() {
                content.push_str(&format!("{}\n", line));
            }
        }
        content.push('\n');

        // Invoice title block
        content.push_str("# Invoice\n");
        content.push_str(&format!("{}\n", ctx.invoice.title));
        content.push_str(&format!(
            "Issued on {}\n\n",
            ctx.invoice.create_date.format("%m/%d/%Y")
        ));

        content.push_str("**Invoice #**\n");
        content.push_str(&format!("{}\n\n", ctx.invoice.id));

        // Billed client
        content.push_str("**Invoice for**\n");
        content.push_str(&format!("{}\n", ctx.client));
        if !ctx.client.company.is_empty() {
            content.push_str(&format!("{}\n", ctx.client.company));
        }
        if !ctx.client.country.is_empty() {
            content.push_str(&format!("{}\n", ctx.client.country));
        }
        content.push('\n');

        // Line items table
        content.push_str("| Description | Quantity | Rate | Amount |\n");
        content.push_str("| --- | --- | --- | --- |\n");

        let mut total_cents: i64 = 0;
        for item in ctx.items {
            total_cents += item.quantity * item.rate_cents;

            content.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                item.description,
                item.quantity,
                item.rate(),
                item.subtotal()
            ));
        }
        content.push('\n');

        content.push_str("**Total**\n");
        content.push_str(&format!("{}\n\n", Decimal::new(total_cents, 2)));

        content.push_str("**Terms**\n");
        content.push_str(&format!("{}\n", ctx.invoice.invoice_terms));

        content
    }
}

impl Default for InvoiceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn push_line(
    layer: &printpdf::PdfLayerReference,
    font: &printpdf::IndirectFontRef,
    text: &str,
    font_size: f32,
    x: f32,
    y: f32,
) {
    layer.use_text(text, font_size, Mm(x), Mm(y), font);
}

/// Lays the markup out on A4 pages with the built-in Helvetica faces:
/// `# ` headings bold at 16pt, `**` lines bold at 11pt, table rows split
/// into fixed columns, rule rows drawn as horizontal lines.
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, markup: &str, base_url: &str) -> Result<Vec<u8>> {
        let (doc, page1, layer1) = PdfDocument::new("Invoice", Mm(210.0), Mm(297.0), "Layer 1");
        let mut layer = doc.get_page(page1).get_layer(layer1);

        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("failed to load font: {e}"))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("failed to load font: {e}"))?;

        let column_xs = [15.0, 110.0, 140.0, 170.0];
        let mut y: f32 = 285.0;

        for raw in markup.lines() {
            if y < 25.0 {
                let (page, new_layer) = doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
                layer = doc.get_page(page).get_layer(new_layer);
                y = 285.0;
            }

            let line = raw.trim_end();
            if line.is_empty() {
                y -= 3.0;
            } else if let Some(heading) = line.strip_prefix("# ") {
                push_line(&layer, &font_bold, heading, 16.0, 15.0, y);
                y -= 8.0;
            } else if line.starts_with('|') {
                let cells: Vec<&str> = line
                    .trim_matches('|')
                    .split('|')
                    .map(str::trim)
                    .collect();

                let is_rule = cells
                    .iter()
                    .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'));

                if is_rule {
                    layer.add_line(printpdf::Line {
                        points: vec![
                            (printpdf::Point::new(Mm(15.0), Mm(y + 1.5)), false),
                            (printpdf::Point::new(Mm(195.0), Mm(y + 1.5)), false),
                        ],
                        is_closed: false,
                    });
                    y -= 3.0;
                } else {
                    for (cell, x) in cells.iter().zip(column_xs) {
                        push_line(&layer, &font, cell, 10.0, x, y);
                    }
                    y -= 5.0;
                }
            } else if line.len() > 4 && line.starts_with("**") && line.ends_with("**") {
                push_line(&layer, &font_bold, line.trim_matches('*'), 11.0, 15.0, y);
                y -= 5.0;
            } else {
                push_line(&layer, &font, line, 10.0, 15.0, y);
                y -= 5.0;
            }
        }

        push_line(&layer, &font, base_url, 9.0, 15.0, 12.0);

        let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer)
            .map_err(|e| anyhow!("failed to write PDF: {e}"))?;

        writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush PDF bytes: {e}"))
    }
}
