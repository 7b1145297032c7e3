//! Server-side report rendering.
//!
//! Pure functions from a validated report to markup: a semicircular SVG
//! gauge for the obstruction percentage and HTML fragments for the
//! structure/pattern cards and the clinical narrative. No state.

use dise_models::{AnalysisReport, ObstructionBand};

const CX: f64 = 140.0;
const CY: f64 = 150.0;
/// Band ring radii
const R_BAND_OUTER: f64 = 110.0;
const R_BAND_INNER: f64 = 70.0;
/// Value bar sits inside the band ring
const R_BAR_OUTER: f64 = 103.0;
const R_BAR_INNER: f64 = 77.0;
/// Threshold marker crosses the whole ring
const R_NEEDLE_INNER: f64 = 60.0;
const R_NEEDLE_OUTER: f64 = 120.0;

const BAR_COLOR: &str = "#8B0000";
const THRESHOLD_COLOR: &str = "red";

/// Dial point for a value on the 0-100 scale. 0 is the left end of the
/// semicircle, 100 the right end.
fn polar(r: f64, value: f64) -> (f64, f64) {
    let rad = (180.0 - value * 1.8).to_radians();
    (CX + r * rad.cos(), CY - r * rad.sin())
}

/// Annular sector path between two dial values.
fn annular_path(from: f64, to: f64, r_outer: f64, r_inner: f64) -> String {
    let (x1, y1) = polar(r_outer, from);
    let (x2, y2) = polar(r_outer, to);
    let (x3, y3) = polar(r_inner, to);
    let (x4, y4) = polar(r_inner, from);
    let large = if to - from > 50.0 { 1 } else { 0 };

    format!(
        "M {x1:.1} {y1:.1} A {r_outer:.1} {r_outer:.1} 0 {large} 1 {x2:.1} {y2:.1} \
         L {x3:.1} {y3:.1} A {r_inner:.1} {r_inner:.1} 0 {large} 0 {x4:.1} {y4:.1} Z"
    )
}

/// Render the obstruction gauge for a 0-100 value.
pub fn gauge_svg(value: u8) -> String {
    let value = value.min(100);
    let band = ObstructionBand::for_value(value);

    let mut svg = format!(
        r#"<svg viewBox="0 0 280 180" class="gauge" role="img" aria-label="Grau de Obstrução: {value}" data-value="{value}" data-band="{}">"#,
        band.as_str()
    );

    for background in [
        ObstructionBand::Normal,
        ObstructionBand::Caution,
        ObstructionBand::Severe,
    ] {
        let (from, to) = background.range();
        svg.push_str(&format!(
            r##"<path d="{}" fill="{}" stroke="#ddd" stroke-width="1"/>"##,
            annular_path(from as f64, to as f64, R_BAND_OUTER, R_BAND_INNER),
            background.color()
        ));
    }

    if value > 0 {
        svg.push_str(&format!(
            r#"<path d="{}" fill="{BAR_COLOR}"/>"#,
            annular_path(0.0, value as f64, R_BAR_OUTER, R_BAR_INNER)
        ));
    }

    let (x1, y1) = polar(R_NEEDLE_INNER, value as f64);
    let (x2, y2) = polar(R_NEEDLE_OUTER, value as f64);
    svg.push_str(&format!(
        r#"<line class="threshold" x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}" stroke="{THRESHOLD_COLOR}" stroke-width="4"/>"#
    ));

    svg.push_str(&format!(
        r#"<text x="140" y="140" text-anchor="middle" class="gauge-value" font-size="36" font-weight="bold">{value}</text>"#
    ));
    svg.push_str(r#"<text x="30" y="170" text-anchor="middle" font-size="12">0</text>"#);
    svg.push_str(r#"<text x="250" y="170" text-anchor="middle" font-size="12">100</text>"#);
    svg.push_str("</svg>");
    svg
}

/// Escape text for inclusion in an HTML fragment. Character content is
/// preserved verbatim once the browser decodes the entities.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the full report fragment: gauge, cards, narrative.
pub fn render_report(report: &AnalysisReport) -> String {
    format!(
        r#"<div class="report">
  <h3 class="gauge-title">Grau de Obstrução</h3>
  {gauge}
  <div class="cards">
    <div class="card">
      <span class="card-label">Estrutura</span><br>
      <span class="card-value">{estrutura}</span>
    </div>
    <div class="card">
      <span class="card-label">Padrão</span><br>
      <span class="card-value">{padrao}</span>
    </div>
  </div>
  <div class="narrative">
    <h3>Laudo Técnico Detalhado</h3>
    <p>{analise}</p>
    <p class="confidence">Nível de Confiança da IA: <b>{confianca}%</b></p>
  </div>
</div>"#,
        gauge = gauge_svg(report.obstrucao_percentual),
        estrutura = escape_html(&report.estrutura_colapsada),
        padrao = escape_html(&report.padrao_colapso),
        analise = escape_html(&report.analise_clinica),
        confianca = report.nivel_confianca,
    )
}
