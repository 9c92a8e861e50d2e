use std::fmt;

use serde::{Serialize, Serializer};

/// Human-readable explanation attached to a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Driver {
    HeadcountVariance,
    SoftwareInfrastructure,
    FixedRent,
    RemoteFixedOverheads,
    LowEfficiency { utilization: f64 },
    SmallTeamRisk,
    UtilizationVariance,
    StartupFriction,
    StandardFixedOverheads,
    SoftwareInfrastructureCosts,
    FloorHit,
    HighSoftwareDrag,
    WorkforceEfficiencyGap,
    HeuristicEstimate,
    InactiveOrganization,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::HeadcountVariance => "Headcount Variance",
            Self::SoftwareInfrastructure => "Software Infrastructure",
            Self::FixedRent => "Fixed Rent",
            Self::RemoteFixedOverheads => "Standard Fixed Overheads (Remote)",
            Self::LowEfficiency { utilization } => {
                return write!(f, "Low Efficiency Impact ({utilization}%)");
            }
            Self::SmallTeamRisk => "Small Team Inefficiency Risk",
            Self::UtilizationVariance => "Utilization Variance",
            Self::StartupFriction => "Small Team Inefficiency (Startup Friction)",
            Self::StandardFixedOverheads => "Standard Fixed Overheads",
            Self::SoftwareInfrastructureCosts => "Software Infrastructure Costs",
            Self::FloorHit => "Fixed Infrastructure Costs (Floor Hit)",
            Self::HighSoftwareDrag => "High Software Costs & Efficiency Drag",
            Self::WorkforceEfficiencyGap => "Workforce Efficiency Gap (High Idle Time)",
            Self::HeuristicEstimate => "Heuristic Estimate (Insufficient Historical Data)",
            Self::InactiveOrganization => "Inactive Organization",
        };
        f.write_str(label)
    }
}

impl Serialize for Driver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
