// Copyright 2016 PingCAP, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

/// Build a `HashMap` of label pairs.
///
/// # Examples
///
/// ```
/// # #[macro_use] extern crate telemeter;
/// # fn main() {
/// let labels = labels!{
///     "service" => "users",
///     "zone" => "eu",
/// };
/// assert_eq!(labels.len(), 2);
/// # }
/// ```
#[macro_export]
macro_rules! labels {
    () => {
        {
            use std::collections::HashMap;

            HashMap::new()
        }
    };

    ( $ ( $ KEY : expr => $ VALUE : expr , ) + ) => {
        {
            use std::collections::HashMap;

            let mut lbs = HashMap::new();
            $(
                lbs.insert($KEY, $VALUE);
            )+

            lbs
        }
    }
}

/// Build [`Opts`](crate::Opts) from a name, a help string and optionally
/// one or more label maps.
#[macro_export]
macro_rules! opts {
    ( $ NAME : expr , $ HELP : expr $ ( , $ LABELS : expr ) * ) => {
        {
            use std::collections::HashMap;

            let opts = $crate::Opts::new($NAME, $HELP);
            let lbs = HashMap::<String, String>::new();
            $(
                let mut lbs = lbs;
                lbs.extend($LABELS.iter().map(|(k, v)| ((*k).into(), (*v).into())));
            )*

            opts.const_labels(lbs)
        }
    }
}

/// Build [`HistogramOpts`](crate::HistogramOpts) from a name, a help
/// string, and optionally a label map and a bucket list.
#[macro_export]
macro_rules! histogram_opts {
    ( $ NAME : expr , $ HELP : expr , [ $ ( $ BUCKETS : expr ) , * ] ) => {
        {
            let his_opts = $crate::HistogramOpts::new($NAME, $HELP);

            let buckets = Vec::new();
            $(
                let mut buckets = buckets;
                buckets.extend($BUCKETS);
            )*;

            his_opts.buckets(buckets)
        }
    };

    ( $ NAME : expr , $ HELP : expr , $ LABELS : expr , [ $ ( $ BUCKETS : expr ) , + ] ) => {
        {
            use std::collections::HashMap;
            use std::iter::FromIterator;

            let his_opts = histogram_opts!($NAME, $HELP, [ $( $BUCKETS ), + ]);

            his_opts.const_labels(
                HashMap::from_iter($LABELS.iter().map(|(k, v)| ((*k).into(), (*v).into()))))
        }
    };

    ( $ NAME : expr , $ HELP : expr $ ( , $ LABELS : expr ) * ) => {
        {
            let opts = opts!($NAME, $HELP $(, $LABELS ) *);

            $crate::HistogramOpts::from(opts)
        }
    }
}
