//! Fixed provisioning catalog: pipeline panels, their stages, and contact
//! tags
//!
//! These are compile-time constants, not user input. Stage and tag names
//! are the exact strings the target CRM expects on screen.

/// Semantic column position within a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Initial,
    Intermediate,
    Final,
}

impl StageKind {
    /// Label shown by the CRM's stage-type dropdown
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Initial => "Fase inicial",
            StageKind::Intermediate => "Fase intermediária",
            StageKind::Final => "Fase final",
        }
    }
}

/// A column within a panel
#[derive(Debug, Clone)]
pub struct StageDef {
    pub name: &'static str,
    pub kind: StageKind,
}

/// A kanban-style pipeline board
#[derive(Debug, Clone)]
pub struct PanelDef {
    pub name: &'static str,
    pub description: &'static str,
    pub stages: Vec<StageDef>,
}

const fn stage(name: &'static str, kind: StageKind) -> StageDef {
    StageDef { name, kind }
}

/// The four panels provisioned for every account
pub fn default_panels() -> Vec<PanelDef> {
    use StageKind::{Final, Initial, Intermediate};

    vec![
        PanelDef {
            name: "Pré-Consulta",
            description: "Nesse painel está a jornada do lead desde o primeiro contato até o comparecimento à consulta.",
            stages: vec![
                stage("Em Contato", Initial),
                stage("Follow-Up", Intermediate),
                stage("Não Respondeu Follow-Up", Intermediate),
                stage("Interessado", Intermediate),
                stage("Não Respondeu Agendamento", Intermediate),
                stage("Agendado", Final),
                stage("Confirmado", Final),
                stage("Compareceu na Consulta", Final),
                stage("Remarcação", Intermediate),
                stage("Não Interessado", Final),
            ],
        },
        PanelDef {
            name: "Pós-Consulta",
            description: "Nesse painel está a jornada do paciente após a consulta para fidelização e novos agendamentos.",
            stages: vec![
                stage("Pós-Consulta Imediato", Initial),
                stage("3 dias", Intermediate),
                stage("7 dias", Intermediate),
                stage("15 dias", Intermediate),
                stage("30 dias", Intermediate),
                stage("3 meses", Intermediate),
                stage("6 meses", Intermediate),
                stage("1 ano", Intermediate),
                stage("Nova Consulta", Final),
            ],
        },
        PanelDef {
            name: "Indicação",
            description: "Nesse painel está a jornada do paciente indicado, desde a sua indicação até o seu comparecimento na consulta.",
            stages: vec![
                stage("Indicado", Initial),
                stage("Validado", Intermediate),
                stage("Em Contato", Intermediate),
                stage("Não Respondeu", Intermediate),
                stage("Agendado", Intermediate),
                stage("Compareceu", Final),
                stage("Não Interessado", Final),
            ],
        },
        PanelDef {
            name: "Tarefas",
            description: "Nesse painel ficam as tarefas de todos os setores da clínica.",
            stages: vec![
                stage("Não Iniciadas", Initial),
                stage("Em Andamento", Intermediate),
                stage("Concluídas", Final),
            ],
        },
    ]
}

/// The three tags applied to the first contact
pub const DEFAULT_TAGS: [&str; 3] = ["Paciente", "Lead", "Equipe"];
