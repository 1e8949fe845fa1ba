use serde::{Deserialize, Serialize};

/// Normalized evaluation document consumed by the downstream risk model.
///
/// Always fully populated: every block carries its documented defaults when
/// the corresponding input section is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvaluateResponse {
    pub fin: FinancialData,
    pub ch: CreditHistoryData,
    pub comp: ComplianceData,
    pub geo: GeographicData,
}

/// Solvency, profitability, and scale metrics derived from the entity
/// summary, ratio tables, and annual comparison series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FinancialData {
    pub utilidad_neta_anual: f64,
    pub razon_circulante: f64,
    pub apalancamiento_pct: f64,
    pub rentabilidad: f64,
    pub anios_historial_ventas: u32,
    pub gran_empresa: bool,
    pub crecimiento_ventas_ultimo_anio_pos: bool,
}

/// Delinquency, exposure, and history metrics derived from the first
/// bureau member of a credit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreditHistoryData {
    pub dias_atraso: i64,
    pub num_open_performing_loan: u32,
    pub saldo_vencido_maxic_udis: f64,
    pub creditos_abiertos: u32,
    pub pct_open_12m: f64,
    pub claves_observacion: Vec<String>,
    pub maximo_credito_aprobado_historico: f64,
}

/// Boolean compliance flags derived from the risk-indicator map.
///
/// `peps_ok` and `profeco_ok` have no data source and are always `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComplianceData {
    pub legal_ok: bool,
    pub pld_ok: bool,
    pub fiscal_ok: bool,
    pub peps_ok: bool,
    pub profeco_ok: bool,
}

/// Address- and activity-derived attributes. `scian` serializes as `null`
/// when the entity reports no economic activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeographicData {
    pub estado: String,
    pub domicilio_validado: bool,
    pub presencia_fisica: bool,
    pub scian: Option<String>,
}
