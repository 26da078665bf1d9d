// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native telematics SDK providers.
//
// `traits` defines the callback-shaped capability surface the bridge drives.
// One concrete provider is compiled per target: `ios` (objc2), `android`
// (jni), or `stub` everywhere else.  `simulator` is an in-process SDK double
// available behind the feature of the same name.

pub mod router;
pub mod traits;

#[cfg(feature = "simulator")]
pub mod simulator;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

use std::sync::Arc;

pub use traits::CapabilityProvider;

/// The provider for the target operating system.
pub fn platform_provider() -> Arc<dyn CapabilityProvider> {
    #[cfg(target_os = "ios")]
    {
        Arc::new(ios::IosProvider::new())
    }
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidProvider::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        Arc::new(stub::StubProvider)
    }
}
