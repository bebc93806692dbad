//! Built-in Safe Work Procedure and Safe Work Practice templates.
//!
//! Procedures are keyed by `job_type`, practices by `id`. Review records that
//! predate stable keys are matched by exact `title`.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeWorkProcedure {
    pub job_type: &'static str,
    pub title: &'static str,
    pub scope: &'static str,
    pub hazards: &'static [&'static str],
    pub control_measures: &'static [&'static str],
    pub ppe: &'static [&'static str],
    pub equipment: &'static [&'static str],
    pub pre_work_checks: &'static [&'static str],
    pub procedure_steps: &'static [&'static str],
    pub emergency_procedures: &'static [&'static str],
    pub competency_requirements: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeWorkPractice {
    pub id: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub key_principles: &'static [&'static str],
    pub requirements: &'static [&'static str],
    pub dos: &'static [&'static str],
    pub donts: &'static [&'static str],
    pub emergency_actions: &'static [&'static str],
}

const COMMON_PPE: &[&str] = &[
    "Full body harness to CSA Z259.10",
    "Helmet with chin strap to EN 12492",
    "Work gloves suited to the task",
    "Safety footwear with ankle support",
];

const COMMON_EMERGENCY: &[&str] = &[
    "Stop work and make the area safe",
    "Initiate the site rescue plan; rescue kit must be rigged and ready",
    "Call emergency services if a casualty cannot be recovered within the rescue plan window",
    "Report the incident to the supervisor before work resumes",
];

pub static SAFE_WORK_PROCEDURES: &[SafeWorkProcedure] = &[
    SafeWorkProcedure {
        job_type: "window_cleaning",
        title: "Window Cleaning - Rope Access",
        scope: "Cleaning of exterior glazing and frames on multi-storey buildings using two-rope access systems.",
        hazards: &[
            "Falls from height - primary hazard requiring rope access controls",
            "Falling objects striking persons below",
            "Rope damage from sharp edges and parapets",
            "Chemical exposure from cleaning solutions",
            "Wind loading and sudden weather changes",
        ],
        control_measures: &[
            "Two independent anchor systems for every technician",
            "Edge protection on all rope contact points",
            "Exclusion zone with barriers and signage at ground level",
            "Tools and buckets tethered at all times",
            "Work suspended when sustained wind exceeds site limits",
        ],
        ppe: COMMON_PPE,
        equipment: &[
            "Kernmantle working and backup lines",
            "Descender with auto-lock and backup device",
            "Bosun's chair or work seat",
            "Tethered squeegee, applicator and bucket",
        ],
        pre_work_checks: &[
            "Inspect anchors and confirm rated capacity",
            "Inspect ropes, harness and hardware before each shift",
            "Confirm weather forecast and wind readings",
            "Confirm rescue plan and rescue kit on site",
        ],
        procedure_steps: &[
            "Establish exclusion zone below the drop",
            "Rig working and backup lines to independent anchors",
            "Buddy check harness, connectors and devices",
            "Descend while cleaning in controlled sections",
            "Land, derig and inspect equipment",
        ],
        emergency_procedures: COMMON_EMERGENCY,
        competency_requirements: &[
            "IRATA or SPRAT Level 1 minimum, supervised by Level 3",
            "Current first aid certificate on the team",
        ],
    },
    SafeWorkProcedure {
        job_type: "building_inspection",
        title: "Building Inspection - Rope Access",
        scope: "Visual and tactile inspection of facades, cladding and sealants from rope access.",
        hazards: &[
            "Falls from height during descent and traverse",
            "Loose facade elements dislodging onto persons below",
            "Rope abrasion on rough or damaged surfaces",
            "Fatigue from extended suspension",
        ],
        control_measures: &[
            "Two-rope system with independent anchors",
            "Exclusion zone maintained for the full drop",
            "Rope protectors at every edge and abrasion point",
            "Scheduled rest breaks and rotation",
        ],
        ppe: COMMON_PPE,
        equipment: &[
            "Working and backup lines",
            "Descender and backup device",
            "Inspection hammer and tethered camera",
        ],
        pre_work_checks: &[
            "Review previous inspection reports and drawings",
            "Inspect anchors, ropes and harness",
            "Confirm communication method with ground crew",
        ],
        procedure_steps: &[
            "Rig lines and establish exclusion zone",
            "Descend drop by drop recording defects with photographs",
            "Mark hazardous defects for immediate reporting",
            "Derig and compile the inspection record",
        ],
        emergency_procedures: COMMON_EMERGENCY,
        competency_requirements: &[
            "IRATA or SPRAT Level 1 minimum with inspection experience",
            "Level 3 supervisor on site",
        ],
    },
    SafeWorkProcedure {
        job_type: "caulking",
        title: "Caulking and Sealant - Rope Access",
        scope: "Removal and replacement of joint sealants on building envelopes from rope access.",
        hazards: &[
            "Falls from height while working on joints",
            "Cuts from knives and sealant removal tools",
            "Chemical exposure from primers and sealants",
            "Dropped tools and cartridges",
        ],
        control_measures: &[
            "Two-rope system with independent anchors",
            "Blade tools tethered and sheathed when not in use",
            "Safety data sheets reviewed before use",
            "Exclusion zone at ground level",
        ],
        ppe: COMMON_PPE,
        equipment: &[
            "Working and backup lines",
            "Tethered sealant gun and cutting tools",
            "Backer rod and tooling spatulas",
        ],
        pre_work_checks: &[
            "Confirm sealant product and cure conditions",
            "Inspect anchors, ropes and harness",
            "Check surface temperature and moisture",
        ],
        procedure_steps: &[
            "Rig lines and set exclusion zone",
            "Cut out failed sealant and clean joint",
            "Install backer rod and primer",
            "Apply and tool new sealant",
            "Derig and dispose of waste per site rules",
        ],
        emergency_procedures: COMMON_EMERGENCY,
        competency_requirements: &[
            "IRATA or SPRAT Level 1 minimum",
            "Sealant manufacturer application training",
        ],
    },
    SafeWorkProcedure {
        job_type: "painting",
        title: "Painting - Rope Access",
        scope: "Surface preparation and coating of structures and facades from rope access.",
        hazards: &[
            "Falls from height while applying coatings",
            "Inhalation of paint vapours and dust",
            "Overspray and drips onto public areas",
            "Slippery surfaces on wet coatings",
        ],
        control_measures: &[
            "Two-rope system with independent anchors",
            "Respiratory protection matched to the coating",
            "Drop sheets and wind checks before spraying",
            "Exclusion zone at ground level",
        ],
        ppe: COMMON_PPE,
        equipment: &[
            "Working and backup lines",
            "Tethered rollers, brushes and paint pots",
            "Respirator with suitable cartridges",
        ],
        pre_work_checks: &[
            "Review coating data sheets",
            "Inspect anchors, ropes and harness",
            "Confirm weather window for application and cure",
        ],
        procedure_steps: &[
            "Rig lines and set exclusion zone",
            "Prepare the surface section by section",
            "Apply coatings top down",
            "Derig and clean equipment",
        ],
        emergency_procedures: COMMON_EMERGENCY,
        competency_requirements: &["IRATA or SPRAT Level 1 minimum"],
    },
];

pub static SAFE_WORK_PRACTICES: &[SafeWorkPractice] = &[
    SafeWorkPractice {
        id: "working_at_heights",
        title: "Working at Heights",
        summary: "General practice for any task with a risk of falling from one level to another.",
        key_principles: &[
            "Eliminate the need to work at height where practicable",
            "Two independent points of attachment at all times",
            "Never work alone at height",
        ],
        requirements: &[
            "Site-specific fall protection plan",
            "Rescue plan in place before work starts",
            "Equipment inspected and within service life",
        ],
        dos: &[
            "Do perform buddy checks before every descent",
            "Do protect ropes at every edge",
            "Do stop work if conditions change",
        ],
        donts: &[
            "Don't detach from both systems at the same time",
            "Don't use damaged or uninspected equipment",
            "Don't work beyond your certification level",
        ],
        emergency_actions: &[
            "Raise the alarm and stop work",
            "Carry out rescue per the rescue plan",
            "Call emergency services when required",
        ],
    },
    SafeWorkPractice {
        id: "exclusion_zones",
        title: "Exclusion Zones",
        summary: "Protecting the public and other trades from falling objects below rope access work.",
        key_principles: &[
            "The zone covers the full drop plus a wind drift margin",
            "The zone is in place before rigging starts",
        ],
        requirements: &[
            "Physical barriers and signage",
            "Ground attendant for public areas",
        ],
        dos: &[
            "Do tether every tool and item at height",
            "Do re-check barriers at every break",
        ],
        donts: &[
            "Don't allow entry while work is in progress above",
            "Don't remove barriers until derigging is complete",
        ],
        emergency_actions: &[
            "Stop work above if the zone is breached",
            "Report any dropped object immediately",
        ],
    },
    SafeWorkPractice {
        id: "weather_monitoring",
        title: "Weather Monitoring",
        summary: "Assessing wind, rain, heat and lightning before and during rope access work.",
        key_principles: &[
            "Weather is checked before and during every shift",
            "Any technician may stop work for weather",
        ],
        requirements: &[
            "Anemometer reading at the work level",
            "Forecast reviewed at the pre-start meeting",
        ],
        dos: &[
            "Do record wind readings in the daily log",
            "Do plan for heat stress and hydration",
        ],
        donts: &[
            "Don't start a drop with a storm approaching",
            "Don't continue work in gusts above site limits",
        ],
        emergency_actions: &[
            "Descend to the nearest safe landing",
            "Secure loose equipment and ropes",
        ],
    },
];

pub fn procedure_by_job_type(job_type: &str) -> Option<&'static SafeWorkProcedure> {
    SAFE_WORK_PROCEDURES
        .iter()
        .find(|procedure| procedure.job_type == job_type)
}

pub fn procedure_by_title(title: &str) -> Option<&'static SafeWorkProcedure> {
    SAFE_WORK_PROCEDURES
        .iter()
        .find(|procedure| procedure.title == title)
}

pub fn practice_by_id(id: &str) -> Option<&'static SafeWorkPractice> {
    SAFE_WORK_PRACTICES.iter().find(|practice| practice.id == id)
}

pub fn practice_by_title(title: &str) -> Option<&'static SafeWorkPractice> {
    SAFE_WORK_PRACTICES
        .iter()
        .find(|practice| practice.title == title)
}
