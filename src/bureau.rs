/// Credit-history metrics derived from a bureau report tree.
///
/// Only the first bureau member of a report is processed; additional
/// members are out of scope for this gateway. A report with no members,
/// or a first member with no data, maps to the all-default record with
/// no partial computation.
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::coerce::{as_f64_or, as_i64_or, parse_flexible_date, str_or_empty};
use crate::models::CreditHistoryData;

/// Approximate pesos-to-UDI conversion. Reporting uses a fixed rate
/// rather than the daily published value.
const UDIS_PER_MXN: f64 = 1.0 / 7.5;

/// Days of delinquency below which an open credit line still counts as
/// performing.
const PERFORMING_THRESHOLD_DAYS: i64 = 30;

pub fn map_credit_history(buro_report: Option<&Value>, now: DateTime<Utc>) -> CreditHistoryData {
    let first_member = match buro_report
        .and_then(|r| r.get("Buro"))
        .and_then(Value::as_array)
        .and_then(|members| members.first())
    {
        Some(member) => member,
        None => return CreditHistoryData::default(),
    };

    let member_data = match first_member
        .get("data")
        .and_then(Value::as_object)
        .filter(|data| !data.is_empty())
    {
        Some(data) => data,
        None => return CreditHistoryData::default(),
    };

    let financial = member_data
        .get("creditoFinanciero")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let commercial = member_data
        .get("creditoComercial")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    CreditHistoryData {
        dias_atraso: max_days_overdue(financial),
        num_open_performing_loan: count_open_performing_loans(financial),
        saldo_vencido_maxic_udis: max_overdue_balance_udis(financial, commercial),
        creditos_abiertos: count_open_credits(financial),
        pct_open_12m: pct_opened_last_12m(financial, now),
        claves_observacion: observation_keys(financial),
        maximo_credito_aprobado_historico: max_approved_credit(financial),
    }
}

/// Worst delinquency in days across all financial lines, taking the
/// greater of each line's reported `atrasoMayor` and its payment-history
/// estimate.
fn max_days_overdue(creditos: &[Value]) -> i64 {
    let mut max_days = 0;

    for credito in creditos {
        let atraso = as_i64_or(credito.get("atrasoMayor"), 0);
        if atraso > max_days {
            max_days = atraso;
        }

        let historia = str_or_empty(credito.get("historicoPagos"));
        if !historia.is_empty() {
            let from_history = days_from_payment_history(historia);
            if from_history > max_days {
                max_days = from_history;
            }
        }
    }

    max_days
}

/// Estimates days overdue from a payment-history string, where each
/// character is a per-period delinquency bucket code (`0` current,
/// `1` = 1-29 days, ... `7` = 180+).
///
/// Selects the lexicographically greatest character of the string and
/// looks up that single code; codes outside the table (`8`, `9`, or
/// non-digits) map to 0 days.
fn days_from_payment_history(historia: &str) -> i64 {
    let max_code = match historia.chars().max() {
        Some(code) => code,
        None => return 0,
    };

    match max_code {
        '0' => 0,
        '1' => 15,
        '2' => 45,
        '3' => 75,
        '4' => 105,
        '5' => 135,
        '6' => 165,
        '7' => 195,
        _ => 0,
    }
}

/// A line with no closure date is open. Null and empty-string closure
/// dates count as absent.
fn is_open(credito: &Value) -> bool {
    match credito.get("fechaCierre") {
        None | Some(Value::Null) => true,
        Some(Value::String(fecha)) => fecha.is_empty(),
        Some(_) => false,
    }
}

fn count_open_performing_loans(creditos: &[Value]) -> u32 {
    creditos
        .iter()
        .filter(|credito| {
            is_open(credito)
                && as_i64_or(credito.get("atrasoMayor"), 0) < PERFORMING_THRESHOLD_DAYS
        })
        .count() as u32
}

fn count_open_credits(creditos: &[Value]) -> u32 {
    creditos.iter().filter(|credito| is_open(credito)).count() as u32
}

const OVERDUE_BUCKET_FIELDS: [&str; 6] = [
    "saldoVencidoDe1a29Dias",
    "saldoVencidoDe30a59Dias",
    "saldoVencidoDe60a89Dias",
    "saldoVencidoDe90a119Dias",
    "saldoVencidoDe120a179Dias",
    "saldoVencidoDe180DiasOMas",
];

/// Worst single overdue exposure across both credit populations,
/// converted to UDIs. Financial lines aggregate their six bucketed
/// balances; commercial lines report a single overdue balance. The
/// result is a maximum over lines, not a sum.
fn max_overdue_balance_udis(financial: &[Value], commercial: &[Value]) -> f64 {
    let mut max_saldo_vencido = 0.0_f64;

    for credito in financial {
        let total: f64 = OVERDUE_BUCKET_FIELDS
            .iter()
            .map(|field| as_f64_or(credito.get(*field), 0.0))
            .sum();
        if total > max_saldo_vencido {
            max_saldo_vencido = total;
        }
    }

    for credito in commercial {
        let saldo_vencido = as_f64_or(credito.get("saldoVencido"), 0.0);
        if saldo_vencido > max_saldo_vencido {
            max_saldo_vencido = saldo_vencido;
        }
    }

    max_saldo_vencido * UDIS_PER_MXN
}

/// Share of open lines opened within the last 365 days of `now`, as a
/// percentage. Lines whose opening date is missing or unparseable stay
/// in the denominator but never count as recent.
fn pct_opened_last_12m(creditos: &[Value], now: DateTime<Utc>) -> f64 {
    if creditos.is_empty() {
        return 0.0;
    }

    let cutoff = now.naive_utc() - Duration::days(365);
    let mut recent = 0u32;
    let mut open_total = 0u32;

    for credito in creditos {
        if !is_open(credito) {
            continue;
        }
        open_total += 1;

        let apertura = str_or_empty(credito.get("apertura"));
        if let Some(opened) = parse_flexible_date(apertura) {
            if let Some(opened_at) = opened.and_hms_opt(0, 0, 0) {
                if opened_at >= cutoff {
                    recent += 1;
                }
            }
        }
    }

    if open_total == 0 {
        return 0.0;
    }

    f64::from(recent) / f64::from(open_total) * 100.0
}

/// Distinct non-empty observation keys across financial lines, in
/// first-occurrence order.
fn observation_keys(creditos: &[Value]) -> Vec<String> {
    let mut claves: Vec<String> = Vec::new();

    for credito in creditos {
        let clave = str_or_empty(credito.get("claveObservacion")).trim();
        if !clave.is_empty() && !claves.iter().any(|existing| existing == clave) {
            claves.push(clave.to_string());
        }
    }

    claves
}

/// Largest historical approved amount, taking the greater of the maximum
/// utilized credit and the initial balance of each line.
fn max_approved_credit(creditos: &[Value]) -> f64 {
    let mut max_credito = 0.0_f64;

    for credito in creditos {
        let credito_max = as_f64_or(credito.get("creditoMaximoUtilizado"), 0.0);
        if credito_max > max_credito {
            max_credito = credito_max;
        }

        let saldo_inicial = as_f64_or(credito.get("saldoInicial"), 0.0);
        if saldo_inicial > max_credito {
            max_credito = saldo_inicial;
        }
    }

    max_credito
}
