//
// Copyright (c) The Certz Contributors
//
// SPDX-License-Identifier: MIT
//

//! Generated bindings of the device-facing gRPC services.

pub mod certz {
    #![allow(clippy::all)]
    tonic::include_proto!("gnsi.certz.v1");
}

pub mod gnmi {
    #![allow(clippy::all)]
    tonic::include_proto!("gnmi");
}

pub mod gnoi_system {
    #![allow(clippy::all)]
    tonic::include_proto!("gnoi.system");
}

pub mod gribi {
    #![allow(clippy::all)]
    tonic::include_proto!("gribi");
}

pub mod p4runtime {
    #![allow(clippy::all)]
    tonic::include_proto!("p4.v1");
}
