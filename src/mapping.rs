/// Normalization engine: converts raw business-insights payloads into the
/// fixed four-block evaluation document.
///
/// The mapping is pure and total: missing or malformed optional fields
/// degrade to documented defaults, never to errors. The four sub-mappers
/// share no state and run in a fixed order only for determinism of the
/// assembled envelope.
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::bureau;
use crate::coerce::{as_f64_or, str_or_empty};
use crate::models::{ComplianceData, EvaluateResponse, FinancialData, GeographicData};

/// Total yearly income above which an entity counts as a large company.
const GRAN_EMPRESA_THRESHOLD: f64 = 1_000_000.0;

/// Period label used for accumulated (non-yearly) totals in ratio tables
/// and annual comparison items.
const ACCUMULATED_PERIOD: &str = "Acumulado";

/// Maps a composite insights document to the evaluation request format.
///
/// `now` is the reference instant for the time-relative credit-history
/// metric (`pct_open_12m`); callers pass `Utc::now()`, tests inject a
/// fixed value.
pub fn map_to_evaluate_request(data: &Value, now: DateTime<Utc>) -> EvaluateResponse {
    let summary = data.get("summaryData");
    let ratios = data.get("financialRatiosData");
    let risks = data.get("riskIndicatorsData").and_then(|v| v.get("data"));
    let annual = data
        .get("annualComparisonData")
        .and_then(|v| v.get("items"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let buro_report = data.get("buroReportData");

    EvaluateResponse {
        fin: map_financial_data(summary, ratios, annual),
        ch: bureau::map_credit_history(buro_report, now),
        comp: map_compliance_data(risks),
        geo: map_geographic_data(summary),
    }
}

fn map_financial_data(
    summary: Option<&Value>,
    ratios: Option<&Value>,
    annual: &[Value],
) -> FinancialData {
    let utilidad_neta = as_f64_or(summary.and_then(|s| s.get("lastYearNetIncome")), 0.0);

    let razon_circulante = most_recent_ratio(ratio_table(ratios, "liquidity", "current_ratio"));

    let debt_ratio = most_recent_ratio(ratio_table(ratios, "leverage", "total_debt_ratio"));
    let apalancamiento_pct = debt_ratio.map(|r| r * 100.0).unwrap_or(0.0);

    let rentabilidad = most_recent_ratio(ratio_table(ratios, "profitability", "return_on_assets"));

    // An accumulated-total entry does not represent a distinct year of
    // sales history.
    let mut anios_historial = annual.len() as u32;
    if anios_historial > 0
        && annual
            .iter()
            .any(|item| item.get("period").and_then(Value::as_str) == Some(ACCUMULATED_PERIOD))
    {
        anios_historial -= 1;
    }

    let total_ingresos = as_f64_or(summary.and_then(|s| s.get("lastYearTotalIncome")), 0.0);
    let gran_empresa = total_ingresos > GRAN_EMPRESA_THRESHOLD;

    FinancialData {
        utilidad_neta_anual: utilidad_neta,
        razon_circulante: razon_circulante.unwrap_or(0.0),
        apalancamiento_pct,
        rentabilidad: rentabilidad.unwrap_or(0.0),
        anios_historial_ventas: anios_historial,
        gran_empresa,
        crecimiento_ventas_ultimo_anio_pos: sales_growth_positive(annual),
    }
}

fn ratio_table<'a>(ratios: Option<&'a Value>, category: &str, name: &str) -> Option<&'a Value> {
    ratios?.get(category)?.get(name)
}

/// Picks the value for the greatest purely-numeric year key of a
/// year-to-value table. Non-numeric keys (notably "Acumulado") are not
/// candidates. Returns `None` when no candidate year exists or the value
/// does not coerce to a float.
fn most_recent_ratio(table: Option<&Value>) -> Option<f64> {
    let table = table?.as_object()?;
    let (_, value) = table
        .iter()
        .filter(|(year, _)| !year.is_empty() && year.chars().all(|c| c.is_ascii_digit()))
        .max_by(|(a, _), (b, _)| a.cmp(b))?;

    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Whether net income grew between the two most recent numeric-period
/// entries. Fewer than two numeric periods means no growth signal.
fn sales_growth_positive(annual: &[Value]) -> bool {
    if annual.len() < 2 {
        return false;
    }

    let mut numeric_periods: Vec<(i64, &Value)> = annual
        .iter()
        .filter_map(|item| {
            let period = str_or_empty(item.get("period"));
            if period.is_empty() || !period.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some((period.parse::<i64>().ok()?, item))
        })
        .collect();

    if numeric_periods.len() < 2 {
        return false;
    }

    numeric_periods.sort_by_key(|(year, _)| *year);

    let last = &numeric_periods[numeric_periods.len() - 1].1;
    let prev = &numeric_periods[numeric_periods.len() - 2].1;
    let last_income = as_f64_or(last.get("netIncome"), 0.0);
    let prev_income = as_f64_or(prev.get("netIncome"), 0.0);

    last_income > prev_income
}

fn map_compliance_data(risks: Option<&Value>) -> ComplianceData {
    ComplianceData {
        legal_ok: not_risky(risks.and_then(|r| r.get("taxCompliance"))),
        pld_ok: zero_valued(risks.and_then(|r| r.get("blacklistedCounterparties"))),
        fiscal_ok: not_risky(risks.and_then(|r| r.get("canceledIssuedInvoices"))),
        // No data source available for either flag.
        peps_ok: false,
        profeco_ok: false,
    }
}

/// Safe-failure reduction of a `{risky: bool}` indicator: an absent or
/// empty section fails, and a present section with no usable `risky` flag
/// is treated as risky.
fn not_risky(indicator: Option<&Value>) -> bool {
    match indicator.and_then(Value::as_object) {
        Some(section) if !section.is_empty() => {
            !section.get("risky").and_then(Value::as_bool).unwrap_or(true)
        }
        _ => false,
    }
}

/// True only when the indicator carries a numeric `value` equal to zero.
fn zero_valued(indicator: Option<&Value>) -> bool {
    indicator
        .and_then(|i| i.get("value"))
        .and_then(Value::as_f64)
        .map(|v| v == 0.0)
        .unwrap_or(false)
}

/// Mexican state names searched, in order, as substrings of the fiscal
/// address. "CIUDAD DE MEXICO" sits before the bare "MEXICO" so addresses
/// in the capital normalize to CDMX instead of matching the state.
const MEXICAN_STATES: [&str; 33] = [
    "AGUASCALIENTES",
    "BAJA CALIFORNIA",
    "BAJA CALIFORNIA SUR",
    "CAMPECHE",
    "CHIAPAS",
    "CHIHUAHUA",
    "CIUDAD DE MEXICO",
    "COAHUILA",
    "COLIMA",
    "DURANGO",
    "GUANAJUATO",
    "GUERRERO",
    "HIDALGO",
    "JALISCO",
    "MEXICO",
    "MICHOACAN",
    "MORELOS",
    "NAYARIT",
    "NUEVO LEON",
    "OAXACA",
    "PUEBLA",
    "QUERETARO",
    "QUINTANA ROO",
    "SAN LUIS POTOSI",
    "SINALOA",
    "SONORA",
    "TABASCO",
    "TAMAULIPAS",
    "TLAXCALA",
    "VERACRUZ",
    "YUCATAN",
    "ZACATECAS",
    "CDMX",
];

/// Keyword fragments of economic-activity names mapped to SCIAN code
/// prefixes; first match in order wins.
const SCIAN_KEYWORDS: [(&str, &str); 5] = [
    ("comercio al por mayor", "43"),
    ("comercializadora", "434"),
    ("impresión", "323"),
    ("reparación", "811"),
    ("cómputo", "517"),
];

/// SCIAN code reported when the principal activity matches no keyword.
const SCIAN_DEFAULT: &str = "522190";

fn map_geographic_data(summary: Option<&Value>) -> GeographicData {
    let fiscal_address = str_or_empty(summary.and_then(|s| s.get("fiscalAddress")));

    // Presence of the raw status field is the validation signal; its value
    // is not interpreted.
    let domicilio_validado = summary
        .and_then(|s| s.get("fiscalAddressStatusRaw"))
        .map(|v| !v.is_null())
        .unwrap_or(false);

    let activities = summary
        .and_then(|s| s.get("economicActivities"))
        .and_then(Value::as_array);
    let scian = activities
        .and_then(|a| a.first())
        .map(scian_from_activity);

    GeographicData {
        estado: extract_state_from_address(fiscal_address),
        domicilio_validado,
        presencia_fisica: !fiscal_address.is_empty(),
        scian,
    }
}

/// Case-insensitive first-match search of the state list against the
/// fiscal address; empty string when nothing matches.
pub fn extract_state_from_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }

    let address_upper = address.to_uppercase();
    for estado in MEXICAN_STATES {
        if address_upper.contains(estado) {
            if estado == "CIUDAD DE MEXICO" {
                return "CDMX".to_string();
            }
            return estado.to_string();
        }
    }

    String::new()
}

/// Derives a six-digit SCIAN code from the activity name, right-padding
/// the matched prefix with zeros. Unknown activities get the generic
/// financial-services code.
fn scian_from_activity(activity: &Value) -> String {
    let activity_name = str_or_empty(activity.get("name")).to_lowercase();

    for (keyword, code) in SCIAN_KEYWORDS {
        if activity_name.contains(keyword) {
            return format!("{:0<6}", code);
        }
    }

    SCIAN_DEFAULT.to_string()
}

/// Validates the format of a Mexican RFC (tax id): 3-4 letters, a
/// 6-digit date, and a 3-character homoclave. Used for request-sanity
/// warnings only, never to reject a mapping.
pub fn is_valid_rfc(rfc: &str) -> bool {
    let len = rfc.chars().count();
    if !(12..=13).contains(&len) {
        return false;
    }

    let rfc_regex = Regex::new(r"^[A-ZÑ&]{3,4}[0-9]{6}[A-Z0-9]{3}$").unwrap();
    rfc_regex.is_match(&rfc.to_uppercase())
}
