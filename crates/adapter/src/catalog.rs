//! Built-in resource kinds and their deletion-order contracts.
//!
//! A kind's `blocked_by` list names the kinds whose instances must all reach
//! a terminal state before its own deletions may start. Instances attach to
//! their blockers (a volume to an instance, a NAT gateway to a subnet's
//! traffic), so the blocker must clear first.

/// A registered kind and its static ordering contract.
#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    pub kind: &'static str,
    pub blocked_by: &'static [&'static str],
}

pub const EC2_INSTANCE: &str = "ec2-instance";
pub const AUTOSCALING_GROUP: &str = "autoscaling-group";
pub const EBS_VOLUME: &str = "ebs-volume";
pub const EBS_SNAPSHOT: &str = "ebs-snapshot";
pub const LAMBDA_FUNCTION: &str = "lambda-function";
pub const LOAD_BALANCER: &str = "load-balancer";
pub const NAT_GATEWAY: &str = "nat-gateway";
pub const ELASTIC_IP: &str = "elastic-ip";
pub const INTERNET_GATEWAY: &str = "internet-gateway";
pub const SECURITY_GROUP: &str = "security-group";
pub const SUBNET: &str = "subnet";
pub const VPC: &str = "vpc";
pub const S3_BUCKET: &str = "s3-bucket";
pub const IAM_ROLE: &str = "iam-role";

/// The default catalog. Terminating instances releases volumes, ENIs, and
/// addresses; network plumbing goes after the things that use it; the VPC
/// itself goes last.
pub const BUILTIN_KINDS: &[KindSpec] = &[
    KindSpec {
        kind: EC2_INSTANCE,
        blocked_by: &[],
    },
    KindSpec {
        kind: LAMBDA_FUNCTION,
        blocked_by: &[],
    },
    KindSpec {
        kind: S3_BUCKET,
        blocked_by: &[],
    },
    KindSpec {
        kind: AUTOSCALING_GROUP,
        blocked_by: &[EC2_INSTANCE],
    },
    KindSpec {
        kind: EBS_VOLUME,
        blocked_by: &[EC2_INSTANCE],
    },
    KindSpec {
        kind: EBS_SNAPSHOT,
        blocked_by: &[EBS_VOLUME],
    },
    KindSpec {
        kind: LOAD_BALANCER,
        blocked_by: &[EC2_INSTANCE],
    },
    KindSpec {
        kind: NAT_GATEWAY,
        blocked_by: &[EC2_INSTANCE, LOAD_BALANCER],
    },
    KindSpec {
        kind: ELASTIC_IP,
        blocked_by: &[EC2_INSTANCE, NAT_GATEWAY],
    },
    KindSpec {
        kind: INTERNET_GATEWAY,
        blocked_by: &[NAT_GATEWAY, ELASTIC_IP],
    },
    KindSpec {
        kind: SECURITY_GROUP,
        blocked_by: &[EC2_INSTANCE, LOAD_BALANCER, LAMBDA_FUNCTION, NAT_GATEWAY],
    },
    KindSpec {
        kind: SUBNET,
        blocked_by: &[EC2_INSTANCE, LOAD_BALANCER, LAMBDA_FUNCTION, NAT_GATEWAY],
    },
    KindSpec {
        kind: IAM_ROLE,
        blocked_by: &[EC2_INSTANCE, LAMBDA_FUNCTION, AUTOSCALING_GROUP],
    },
    KindSpec {
        kind: VPC,
        blocked_by: &[
            SUBNET,
            SECURITY_GROUP,
            INTERNET_GATEWAY,
            EBS_VOLUME,
            LAMBDA_FUNCTION,
            AUTOSCALING_GROUP,
        ],
    },
];

/// Looks up a built-in kind spec by identifier.
pub fn lookup(kind: &str) -> Option<&'static KindSpec> {
    BUILTIN_KINDS.iter().find(|spec| spec.kind == kind)
}
